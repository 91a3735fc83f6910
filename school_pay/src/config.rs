use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use common::gateway::{GatewaySettings, RetryPolicy};
use common::GatewaySecret;

use crate::state::AppState;

pub struct AppConfig {
    pub database_url: String,
    pub gateway: GatewaySettings,
    pub bind_addr: String,
    pub port: u16,
    pub payments_csv: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };

        let database_url = required("DATABASE_URL")?;

        let secret = GatewaySecret::new(required("GATEWAY_SECRET_KEY")?);

        let base_url = required("GATEWAY_BASE_URL")?;

        let timeout_secs: u64 = parse_or(&lookup, "GATEWAY_TIMEOUT_SECS", 5)?;
        if timeout_secs == 0 {
            return Err(anyhow!("GATEWAY_TIMEOUT_SECS must be greater than zero"));
        }

        let max_attempts: usize = parse_or(&lookup, "GATEWAY_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(anyhow!("GATEWAY_MAX_ATTEMPTS must be greater than zero"));
        }

        let base_backoff_ms: u64 = parse_or(&lookup, "GATEWAY_BACKOFF_MS", 200)?;

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());

        let port: u16 = parse_or(&lookup, "PORT", 8080)?;

        let payments_csv = lookup("PAYMENTS_CSV").filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            gateway: GatewaySettings {
                base_url,
                secret,
                timeout: Duration::from_secs(timeout_secs),
                retry: RetryPolicy {
                    max_attempts,
                    base_backoff_ms,
                },
            },
            bind_addr,
            port,
            payments_csv,
        })
    }

    pub async fn create_app_state(&self) -> anyhow::Result<AppState> {
        AppState::new(&self.database_url, self.gateway.clone())
            .await
            .context("Failed to initialize AppState")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has invalid value `{}`: {}", key, raw, e)),
        None => Ok(default),
    }
}
