use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::schema::{NewPayment, PaymentRecord, PaymentStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("payment with reference `{0}` already exists")]
    Conflict(String),
    #[error("stored payment `{reference}` is corrupt: {reason}")]
    Corrupt { reference: String, reason: String },
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    reference: String,
    amount: String,
    student_id: Option<i64>,
    status: String,
    verified_amount: Option<String>,
    failure_reason: Option<String>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            reference: row.reference.clone(),
            reason,
        };
        let amount = Decimal::from_str(&row.amount)
            .map_err(|e| corrupt(format!("amount `{}`: {}", row.amount, e)))?;
        let verified_amount = row
            .verified_amount
            .as_deref()
            .map(Decimal::from_str)
            .transpose()
            .map_err(|e| corrupt(format!("verified amount: {}", e)))?;
        let status = PaymentStatus::from_str(&row.status).map_err(|e| corrupt(e.to_string()))?;

        Ok(PaymentRecord {
            id: row.id,
            reference: row.reference,
            amount,
            student_id: row.student_id,
            status,
            verified_amount,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<PaymentRow>) -> Result<Vec<PaymentRecord>, StoreError> {
    rows.into_iter().map(PaymentRecord::try_from).collect()
}

pub struct Database {
    pool: SqlitePool,
}
impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Failed to create SQLite connect options")?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database `{}`", database_url))?;
        Self::migrate(pool).await
    }

    /// A private in-memory database. The pool holds a single connection that
    /// is never recycled, since closing it would drop the data.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Failed to create SQLite connect options")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Database migration error")?;
        Ok(Self { pool })
    }

    pub async fn save_payment(&self, payment: &NewPayment) -> Result<PaymentRecord, StoreError> {
        let amount = payment.amount.to_string();
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (reference, amount, student_id, status)
            VALUES (?, ?, ?, 'PENDING')
            RETURNING *;
            "#,
        )
        .bind(&payment.reference)
        .bind(amount)
        .bind(payment.student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(payment.reference.clone())
            }
            other => StoreError::Sqlx(other),
        })?;

        let record = PaymentRecord::try_from(row)?;
        log::debug!("Saved payment to database: {:?}", record);
        Ok(record)
    }

    pub async fn get_payment(&self, reference: &str) -> Result<Option<PaymentRecord>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT * FROM payments WHERE reference = ?
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRecord::try_from).transpose()
    }

    pub async fn get_all_payments(&self) -> Result<Vec<PaymentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT * FROM payments ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    pub async fn get_payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT * FROM payments WHERE status = ? ORDER BY id
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    /// Moves a pending payment to VERIFIED. Returns `false` when the payment
    /// was no longer pending, i.e. another caller already resolved it.
    pub async fn mark_verified(
        &self,
        reference: &str,
        verified_amount: Decimal,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'VERIFIED',
                verified_amount = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = ? AND status = 'PENDING'
            "#,
        )
        .bind(verified_amount.to_string())
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Moves a pending payment to FAILED. Same contract as [`Database::mark_verified`].
    pub async fn mark_failed(&self, reference: &str, reason: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'FAILED',
                failure_reason = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = ? AND status = 'PENDING'
            "#,
        )
        .bind(reason)
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
