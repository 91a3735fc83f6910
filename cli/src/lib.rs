mod args;

pub use args::{Args, Commands, CreatePaymentArgs};
use clap::Parser;
use common::{Database, NewPayment, PaymentRecord, PaymentStatus, StoreError};
use rust_decimal::Decimal;

/// Runs the CLI command parser and executes the selected command.
/// Returns true if a CLI command was handled, false otherwise.
pub async fn run_cli() -> bool {
    let args = Args::parse();
    match &args.command {
        Some(Commands::CreatePayment(create_args)) => {
            match create_payment(
                &create_args.reference,
                create_args.amount,
                create_args.student_id,
            )
            .await
            {
                Ok(record) => println!(
                    "Payment '{}' recorded with status {}.",
                    record.reference, record.status
                ),
                Err(e) => eprintln!("Failed to create payment: {e:#}"),
            }
            true
        }
        Some(Commands::ListPayments(list_args)) => {
            match list_payments(list_args.status).await {
                Ok(payments) if payments.is_empty() => println!("No payments found."),
                Ok(payments) => {
                    for payment in &payments {
                        println!("{}", format_payment(payment));
                    }
                }
                Err(e) => eprintln!("Failed to list payments: {e:#}"),
            }
            true
        }
        Some(Commands::ImportPayments(import_args)) => {
            match import_payments(&import_args.csv).await {
                Ok((imported, skipped)) => println!(
                    "Imported {} payments from {} ({} already existed).",
                    imported, import_args.csv, skipped
                ),
                Err(e) => eprintln!("Failed to import payments: {e:#}"),
            }
            true
        }
        Some(Commands::GeneratePayments(generate_args)) => {
            match NewPayment::generate_test_payments_csv(&generate_args.out, generate_args.count)
                .await
            {
                Ok(_) => println!(
                    "Successfully generated payments to: {}",
                    generate_args.out
                ),
                Err(e) => eprintln!("Failed to generate payments: {e:#}"),
            }
            true
        }
        None => {
            println!("No CLI command provided. Use --help to see available commands.");
            false
        }
    }
}

/// Validates and stores a pending payment.
async fn create_payment(
    reference: &str,
    amount: Decimal,
    student_id: Option<i64>,
) -> anyhow::Result<PaymentRecord> {
    let payment = NewPayment::new(reference, amount, student_id)
        .map_err(|e| anyhow::anyhow!("Validation error: {e}"))?;

    let db = connect().await?;
    let record = db.save_payment(&payment).await?;
    Ok(record)
}

async fn list_payments(status: Option<PaymentStatus>) -> anyhow::Result<Vec<PaymentRecord>> {
    let db = connect().await?;
    let payments = match status {
        Some(status) => db.get_payments_by_status(status).await?,
        None => db.get_all_payments().await?,
    };
    Ok(payments)
}

/// Loads a seed CSV into the database. Returns (imported, already existing).
async fn import_payments(path: &str) -> anyhow::Result<(usize, usize)> {
    let payments = NewPayment::load_from_csv(path).await?;
    let db = connect().await?;
    save_all(&db, &payments).await
}

/// Saves payments one by one, skipping references that already exist.
pub async fn save_all(db: &Database, payments: &[NewPayment]) -> anyhow::Result<(usize, usize)> {
    let mut imported = 0;
    let mut skipped = 0;
    for payment in payments {
        match db.save_payment(payment).await {
            Ok(_) => imported += 1,
            Err(StoreError::Conflict(_)) => skipped += 1,
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!(
                    "Failed to save payment reference={} to database",
                    payment.reference
                )));
            }
        }
    }
    Ok((imported, skipped))
}

fn format_payment(payment: &PaymentRecord) -> String {
    let student = payment
        .student_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let verified = payment
        .verified_amount
        .map(|amount| amount.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<24} {:>12} {:<9} student={} verified={}",
        payment.reference, payment.amount, payment.status, student, verified
    )
}

/// Helper to open the database named by DATABASE_URL.
async fn connect() -> anyhow::Result<Database> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL not set"))?;
    Database::new(&database_url).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn payment(reference: &str, amount: &str) -> NewPayment {
        NewPayment::new(reference, Decimal::from_str(amount).unwrap(), None).unwrap()
    }

    #[tokio::test]
    async fn save_all_skips_existing_references() {
        let db = Database::in_memory().await.unwrap();
        db.save_payment(&payment("REF-1", "10")).await.unwrap();

        let (imported, skipped) = save_all(
            &db,
            &[payment("REF-1", "99"), payment("REF-2", "20"), payment("REF-3", "30")],
        )
        .await
        .unwrap();

        assert_eq!((imported, skipped), (2, 1));
        let existing = db.get_payment("REF-1").await.unwrap().unwrap();
        assert_eq!(existing.amount, Decimal::from_str("10").unwrap());
    }

    #[test]
    fn formats_payment_row() {
        let record = PaymentRecord {
            id: 1,
            reference: "REF123".to_string(),
            amount: Decimal::from_str("500.00").unwrap(),
            student_id: Some(4),
            status: PaymentStatus::Verified,
            verified_amount: Some(Decimal::from_str("500.00").unwrap()),
            failure_reason: None,
            created_at: None,
            updated_at: None,
        };
        let line = format_payment(&record);
        assert!(line.starts_with("REF123"));
        assert!(line.contains("VERIFIED"));
        assert!(line.contains("student=4"));
        assert!(line.contains("verified=500.00"));
    }
}
