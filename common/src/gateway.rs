//! Client for the payment gateway's transaction verification endpoint.
//!
//! The gateway answers `GET /transaction/verify/{reference}` with
//! `{"status": bool, "message": str, "data": {"status": str, "amount": num, ...}}`.
//! Only that shape is accepted; anything else is a [`GatewayError::Protocol`].
//!
//! `data.amount` is read in the same unit the payment records use (major
//! units, e.g. `500.00`). Gateways reporting minor units need an adapter.
//!
//! Only a 2xx answer can fail a transaction for good. A 401 or 403 means our
//! credentials were refused and is a [`GatewayError::Config`]; any other 4xx
//! `{"status": false}` answer (typically an unknown reference) is reported as
//! [`GatewayVerification::Unsettled`] so the payment can still settle later.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de};

/// Settlement state of a transaction as reported by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayVerification {
    Success {
        amount: Decimal,
        currency: Option<String>,
    },
    /// Terminal failure; the payment will never settle.
    Failed { reason: String },
    /// The gateway knows the transaction but it has not settled yet.
    Unsettled { status: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway unreachable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: usize, reason: String },
    #[error("unexpected payment gateway response: {0}")]
    Protocol(String),
    #[error("invalid payment gateway configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError>;
}

/// Bearer secret for the gateway. Never printed.
#[derive(Clone)]
pub struct GatewaySecret(String);

impl GatewaySecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GatewaySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GatewaySecret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: usize) -> Duration {
        let base = self.base_backoff_ms.saturating_mul(attempt as u64);
        let jitter = rand::rng().random_range(0..=self.base_backoff_ms / 4);
        Duration::from_millis(base.saturating_add(jitter))
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub secret: GatewaySecret,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
    secret: GatewaySecret,
    retry: RetryPolicy,
}

impl HttpGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        if settings.secret.expose().trim().is_empty() {
            return Err(GatewayError::Config("secret key is empty".to_string()));
        }
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| GatewayError::Config(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "base url `{}` cannot carry a path",
                settings.base_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            secret: settings.secret,
            retry: settings.retry,
        })
    }

    fn verify_url(&self, reference: &str) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Config("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["transaction", "verify", reference]);
        Ok(url)
    }

    async fn get_with_retry(&self, url: &Url) -> Result<(StatusCode, Vec<u8>), GatewayError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let req = self.client.get(url.clone()).bearer_auth(self.secret.expose());
            let failure = match req.send().await {
                Ok(resp) if is_transient(resp.status()) => {
                    format!("gateway answered {}", resp.status())
                }
                Ok(resp) => {
                    let status = resp.status();
                    match resp.bytes().await {
                        Ok(body) => return Ok((status, body.to_vec())),
                        Err(e) => format!("read body failed: {e}"),
                    }
                }
                Err(e) if e.is_builder() => {
                    return Err(GatewayError::Config(format!("invalid request: {e}")));
                }
                Err(e) => format!("request failed: {e}"),
            };

            log::warn!(
                "Gateway verification attempt {}/{} for {} failed: {}",
                attempt,
                max_attempts,
                url.path(),
                failure
            );
            if attempt >= max_attempts {
                return Err(GatewayError::Unavailable {
                    attempts: attempt,
                    reason: failure,
                });
            }
            tokio::time::sleep(self.retry.backoff(attempt)).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        let url = self.verify_url(reference)?;
        let (status, body) = self.get_with_retry(&url).await?;
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(GatewayError::Config(format!(
                "gateway rejected credentials (HTTP {status}): {}",
                gateway_message(&body)
            )));
        }
        let verification = match parse_verification(&body)
            .map_err(|e| GatewayError::Protocol(format!("HTTP {status}: {e}")))?
        {
            GatewayVerification::Failed { reason } if !status.is_success() => {
                GatewayVerification::Unsettled {
                    status: format!("gateway answered {status}: {reason}"),
                }
            }
            other => other,
        };
        log::debug!("Gateway verification for {}: {:?}", reference, verification);
        Ok(verification)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    #[serde(default, deserialize_with = "amount_from_json")]
    amount: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
}

fn amount_from_json<'de, D>(d: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let parse = |raw: &str| -> Result<Decimal, D::Error> {
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(de::Error::custom)
    };
    match Option::<serde_json::Value>::deserialize(d)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => parse(&n.to_string()).map(Some),
        Some(serde_json::Value::String(s)) => parse(s.trim()).map(Some),
        Some(other) => Err(de::Error::custom(format!(
            "amount must be a number, got {other}"
        ))),
    }
}

fn gateway_message(body: &[u8]) -> String {
    serde_json::from_slice::<VerifyResponse>(body)
        .ok()
        .and_then(|r| r.message)
        .unwrap_or_else(|| "no message".to_string())
}

fn parse_verification(body: &[u8]) -> Result<GatewayVerification, String> {
    let response: VerifyResponse =
        serde_json::from_slice(body).map_err(|e| format!("invalid body: {e}"))?;

    if !response.status {
        return Ok(GatewayVerification::Failed {
            reason: response
                .message
                .unwrap_or_else(|| "gateway reported failure".to_string()),
        });
    }

    let data = match response.data {
        Some(serde_json::Value::Null) | None => return Err("missing `data`".to_string()),
        Some(data) => data,
    };
    let data: VerifyData =
        serde_json::from_value(data).map_err(|e| format!("invalid `data`: {e}"))?;

    match data.status.to_ascii_lowercase().as_str() {
        "success" => {
            let amount = data
                .amount
                .ok_or_else(|| "missing `data.amount`".to_string())?;
            if amount.is_sign_negative() {
                return Err(format!("negative `data.amount` {amount}"));
            }
            Ok(GatewayVerification::Success {
                amount,
                currency: data.currency,
            })
        }
        "failed" | "abandoned" | "reversed" => Ok(GatewayVerification::Failed {
            reason: data
                .gateway_response
                .or(response.message)
                .unwrap_or(data.status),
        }),
        _ => Ok(GatewayVerification::Unsettled {
            status: data.status,
        }),
    }
}
