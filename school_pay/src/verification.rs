use common::{Database, GatewayVerification, PaymentGateway, PaymentRecord, PaymentStatus};
use rust_decimal::Decimal;

use crate::error::PaymentError;

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    pub reference: String,
    pub amount: Decimal,
}

/// Confirms a payment with the gateway and persists the outcome.
///
/// A record leaves PENDING at most once. Records that are already VERIFIED or
/// FAILED are answered from the store without contacting the gateway.
pub async fn verify_payment(
    db: &Database,
    gateway: &dyn PaymentGateway,
    reference: Option<&str>,
) -> Result<VerifiedPayment, PaymentError> {
    let reference = reference
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| PaymentError::Validation("no reference provided".to_string()))?;

    let record = find_payment(db, reference).await?;
    if let Some(outcome) = settled_outcome(&record) {
        log::info!(
            "Payment {} already {}, skipping gateway call",
            reference,
            record.status
        );
        return outcome;
    }

    match gateway.verify(reference).await? {
        GatewayVerification::Success { amount, currency } => {
            if amount != record.amount {
                log::warn!(
                    "Payment {} verified for {} {} but was initiated for {}",
                    reference,
                    amount,
                    currency.as_deref().unwrap_or(""),
                    record.amount
                );
            }
            if db.mark_verified(reference, amount).await? {
                log::info!("Payment {} verified for {}", reference, amount);
                Ok(VerifiedPayment {
                    reference: reference.to_string(),
                    amount,
                })
            } else {
                resolved_elsewhere(db, reference).await
            }
        }
        GatewayVerification::Failed { reason } => {
            if db.mark_failed(reference, &reason).await? {
                log::info!("Payment {} failed: {}", reference, reason);
                Err(PaymentError::VerificationFailed(reason))
            } else {
                resolved_elsewhere(db, reference).await
            }
        }
        GatewayVerification::Unsettled { status } => {
            log::info!("Payment {} not settled yet ({})", reference, status);
            Err(PaymentError::VerificationFailed(format!(
                "payment not yet settled: {status}"
            )))
        }
    }
}

async fn find_payment(db: &Database, reference: &str) -> Result<PaymentRecord, PaymentError> {
    db.get_payment(reference)
        .await?
        .ok_or_else(|| PaymentError::NotFound(reference.to_string()))
}

/// Another request moved the record out of PENDING first; report its result.
async fn resolved_elsewhere(
    db: &Database,
    reference: &str,
) -> Result<VerifiedPayment, PaymentError> {
    log::warn!(
        "Payment {} was resolved by a concurrent verification",
        reference
    );
    let record = find_payment(db, reference).await?;
    settled_outcome(&record).unwrap_or_else(|| {
        log::error!("Payment {} is still pending after losing a status update", reference);
        Err(PaymentError::Internal)
    })
}

fn settled_outcome(record: &PaymentRecord) -> Option<Result<VerifiedPayment, PaymentError>> {
    match record.status {
        PaymentStatus::Pending => None,
        PaymentStatus::Verified => Some(Ok(VerifiedPayment {
            reference: record.reference.clone(),
            amount: record.verified_amount.unwrap_or(record.amount),
        })),
        PaymentStatus::Failed => Some(Err(PaymentError::VerificationFailed(
            record
                .failure_reason
                .clone()
                .unwrap_or_else(|| "payment verification failed".to_string()),
        ))),
    }
}
