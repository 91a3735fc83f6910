use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rand::Rng;
use rand::distr::Alphanumeric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

pub const MAX_REFERENCE_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Verified => "VERIFIED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment status `{0}`, expected PENDING, VERIFIED or FAILED")]
pub struct ParseStatusError(String);

impl FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "VERIFIED" => Ok(PaymentStatus::Verified),
            "FAILED" => Ok(PaymentStatus::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A fee payment as persisted in the `payments` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub reference: String,
    pub amount: Decimal,
    pub student_id: Option<i64>,
    pub status: PaymentStatus,
    /// Amount confirmed by the gateway, set once the payment is verified.
    pub verified_amount: Option<Decimal>,
    pub failure_reason: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InvalidPayment {
    #[error("no reference provided")]
    EmptyReference,
    #[error("reference must be at most {} characters", MAX_REFERENCE_LEN)]
    ReferenceTooLong,
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),
}

/// A payment the client has just initiated. Also the row format of seed CSV files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub reference: String,
    pub amount: Decimal,
    #[serde(default)]
    pub student_id: Option<i64>,
}

impl NewPayment {
    pub fn new(
        reference: &str,
        amount: Decimal,
        student_id: Option<i64>,
    ) -> Result<Self, InvalidPayment> {
        let payment = NewPayment {
            reference: reference.trim().to_string(),
            amount,
            student_id,
        };
        payment.validate()?;
        Ok(payment)
    }

    pub fn validate(&self) -> Result<(), InvalidPayment> {
        let reference = self.reference.trim();
        if reference.is_empty() {
            return Err(InvalidPayment::EmptyReference);
        }
        if reference.chars().count() > MAX_REFERENCE_LEN {
            return Err(InvalidPayment::ReferenceTooLong);
        }
        if self.amount <= Decimal::ZERO {
            return Err(InvalidPayment::NonPositiveAmount(self.amount));
        }
        Ok(())
    }

    pub async fn load_from_csv(path: &str) -> anyhow::Result<Vec<NewPayment>> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut rdr = csv_async::AsyncReaderBuilder::new()
            .has_headers(true)
            .create_deserializer(content.as_bytes());
        let mut records = rdr.deserialize::<NewPayment>();
        let mut payments = Vec::new();
        while let Some(payment_result) = records.next().await {
            match payment_result {
                Ok(payment) => match payment.validate() {
                    Ok(()) => payments.push(payment),
                    Err(e) => {
                        log::error!("Skipping payment `{}`: {}", payment.reference, e);
                    }
                },
                Err(e) => {
                    log::error!("Error deserializing payment: {}", e);
                    continue;
                }
            }
        }
        log::debug!("Loaded {} payments from CSV file {}", payments.len(), path);
        if payments.is_empty() {
            return Err(anyhow::anyhow!("No payments found in the CSV file"));
        }
        Ok(payments)
    }

    /// Writes `count` random pending payments to a CSV file, for local testing.
    pub async fn generate_test_payments_csv(path: &str, count: usize) -> anyhow::Result<()> {
        let file = tokio::fs::File::create(path).await?;
        let mut wtr = csv_async::AsyncSerializer::from_writer(file);

        let mut rng = rand::rng();

        for _ in 0..count {
            let suffix: String = (&mut rng)
                .sample_iter(Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            let payment = NewPayment {
                reference: format!("FEE-{}", suffix.to_ascii_uppercase()),
                // 50.00 to 2000.00
                amount: Decimal::new(rng.random_range(5_000..=200_000), 2),
                student_id: Some(rng.random_range(1..=500)),
            };
            wtr.serialize(payment).await?;
        }
        log::info!("Test payments CSV generated at {}", path);
        wtr.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("verified".parse::<PaymentStatus>().unwrap(), PaymentStatus::Verified);
        assert_eq!(" PENDING ".parse::<PaymentStatus>().unwrap(), PaymentStatus::Pending);
        assert!("settled".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&PaymentStatus::Failed).unwrap();
        assert_eq!(json, "\"FAILED\"");
    }

    #[test]
    fn new_payment_rejects_bad_input() {
        assert_eq!(
            NewPayment::new("   ", dec!(10), None),
            Err(InvalidPayment::EmptyReference)
        );
        assert_eq!(
            NewPayment::new("REF1", dec!(0), None),
            Err(InvalidPayment::NonPositiveAmount(dec!(0)))
        );
        assert_eq!(
            NewPayment::new(&"R".repeat(MAX_REFERENCE_LEN + 1), dec!(1), None),
            Err(InvalidPayment::ReferenceTooLong)
        );

        let payment = NewPayment::new(" REF1 ", dec!(150.50), Some(7)).unwrap();
        assert_eq!(payment.reference, "REF1");
    }

    #[tokio::test]
    async fn load_from_csv_skips_bad_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reference,amount,student_id").unwrap();
        writeln!(file, "REF-1,500.00,12").unwrap();
        writeln!(file, "REF-2,not-a-number,3").unwrap();
        writeln!(file, ",20.00,").unwrap();
        writeln!(file, "REF-3,75.25,").unwrap();
        file.flush().unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let payments = NewPayment::load_from_csv(&path).await.unwrap();

        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].reference, "REF-1");
        assert_eq!(payments[0].amount, dec!(500.00));
        assert_eq!(payments[0].student_id, Some(12));
        assert_eq!(payments[1].reference, "REF-3");
        assert_eq!(payments[1].student_id, None);
    }

    #[tokio::test]
    async fn load_from_csv_fails_when_nothing_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reference,amount,student_id").unwrap();
        file.flush().unwrap();

        let path = file.path().to_str().unwrap().to_string();
        assert!(NewPayment::load_from_csv(&path).await.is_err());
    }

    #[tokio::test]
    async fn generated_csv_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.csv");
        let path = path.to_str().unwrap();

        NewPayment::generate_test_payments_csv(path, 5).await.unwrap();
        let payments = NewPayment::load_from_csv(path).await.unwrap();

        assert_eq!(payments.len(), 5);
        assert!(payments.iter().all(|p| p.reference.starts_with("FEE-")));
        assert!(payments.iter().all(|p| p.amount > Decimal::ZERO));
    }
}
