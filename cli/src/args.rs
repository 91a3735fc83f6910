use clap::{Args as ClapArgs, Parser, Subcommand};
use common::PaymentStatus;
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(author, version, about = "School Pay CLI - manage fee payment records")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a new pending payment
    CreatePayment(CreatePaymentArgs),

    /// List payment records, optionally filtered by status
    ListPayments(ListPaymentsArgs),

    /// Import pending payments from a CSV file
    ///
    /// The file needs a `reference,amount,student_id` header. Invalid rows and
    /// references that already exist are skipped.
    ImportPayments(ImportPaymentsArgs),

    /// Generate random payments and save to CSV (for testing only)
    GeneratePayments(GeneratePaymentsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CreatePaymentArgs {
    /// Gateway transaction reference
    #[arg(short, long)]
    pub reference: String,

    /// Amount in major units, e.g. 500.00
    #[arg(short, long)]
    pub amount: Decimal,

    /// Student the fee belongs to
    #[arg(short, long)]
    pub student_id: Option<i64>,
}

#[derive(ClapArgs, Debug)]
pub struct ListPaymentsArgs {
    /// PENDING, VERIFIED or FAILED
    #[arg(short, long)]
    pub status: Option<PaymentStatus>,
}

#[derive(ClapArgs, Debug)]
pub struct ImportPaymentsArgs {
    /// Input CSV file path
    #[arg(short, long)]
    pub csv: String,
}

#[derive(ClapArgs, Debug)]
pub struct GeneratePaymentsArgs {
    /// Number of payments to generate
    #[arg(short, long)]
    pub count: usize,

    /// Output CSV file path
    #[arg(short, long)]
    pub out: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn parses_create_payment() {
        let args = Args::try_parse_from([
            "school_pay",
            "create-payment",
            "--reference",
            "REF123",
            "--amount",
            "500.00",
            "--student-id",
            "7",
        ])
        .unwrap();

        match args.command {
            Some(Commands::CreatePayment(create)) => {
                assert_eq!(create.reference, "REF123");
                assert_eq!(create.amount, Decimal::from_str("500.00").unwrap());
                assert_eq!(create.student_id, Some(7));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_status_filter() {
        let args = Args::try_parse_from(["school_pay", "list-payments", "-s", "verified"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::ListPayments(ListPaymentsArgs {
                status: Some(PaymentStatus::Verified)
            }))
        ));

        assert!(Args::try_parse_from(["school_pay", "list-payments", "-s", "settled"]).is_err());
    }

    #[test]
    fn no_command_starts_the_server() {
        let args = Args::try_parse_from(["school_pay"]).unwrap();
        assert!(args.command.is_none());
    }
}
