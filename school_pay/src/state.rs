use std::sync::Arc;

use anyhow::{Context, Result};
use common::gateway::{GatewaySettings, HttpGateway};
use common::{Database, NewPayment, PaymentGateway};

pub struct AppState {
    pub db: Database,
    pub gateway: Arc<dyn PaymentGateway>,
}
impl AppState {
    pub async fn new(database_url: &str, gateway: GatewaySettings) -> Result<Self> {
        let db = Database::new(database_url).await?;
        log::info!("Database initialized successfully!");

        let gateway = HttpGateway::new(gateway).context("Failed to create payment gateway client")?;

        Ok(AppState::with_gateway(db, Arc::new(gateway)))
    }

    pub fn with_gateway(db: Database, gateway: Arc<dyn PaymentGateway>) -> Self {
        AppState { db, gateway }
    }

    /// Seeds pending payments from a CSV file. Existing references are left untouched.
    pub async fn initialize_data_from_files(&self, payments_csv: &str) -> Result<()> {
        let payments = NewPayment::load_from_csv(payments_csv)
            .await
            .with_context(|| format!("Failed to load payments from `{}`", payments_csv))?;

        let (imported, skipped) = cli::save_all(&self.db, &payments).await?;
        log::info!(
            "Seeded {} payments from {} ({} already existed)",
            imported,
            payments_csv,
            skipped
        );
        Ok(())
    }
}
