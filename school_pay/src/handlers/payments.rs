use actix_web::{HttpResponse, get, post, web};
use common::{NewPayment, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::state::AppState;
use crate::verification;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    status: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
}

#[post("/payments/verify")]
pub async fn verify_payment(
    body: web::Json<VerifyRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, PaymentError> {
    let verified = verification::verify_payment(
        &app_state.db,
        app_state.gateway.as_ref(),
        body.reference.as_deref(),
    )
    .await?;
    log::debug!("Answered verification for {}", verified.reference);

    Ok(HttpResponse::Ok().json(VerifyResponse {
        status: "Payment Verified",
        amount: verified.amount,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    reference: String,
    amount: Decimal,
    #[serde(default)]
    student_id: Option<i64>,
}

#[post("/payments")]
pub async fn create_payment(
    body: web::Json<CreatePaymentRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, PaymentError> {
    let payment = NewPayment::new(&body.reference, body.amount, body.student_id)?;
    let record = app_state.db.save_payment(&payment).await?;
    log::info!(
        "Payment {} initiated for {}",
        record.reference,
        record.amount
    );

    Ok(HttpResponse::Created().json(record))
}

#[derive(Debug, Deserialize)]
struct PaymentQuery {
    #[serde(default)]
    status: Option<String>,
}

#[get("/payments")]
pub async fn get_payments(
    query: web::Query<PaymentQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, PaymentError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(raw.parse::<PaymentStatus>().map_err(|_| {
            PaymentError::Validation(
                "Payment status must be either 'PENDING', 'VERIFIED', or 'FAILED'.".to_string(),
            )
        })?),
        None => None,
    };

    let payments = match status {
        Some(status) => app_state.db.get_payments_by_status(status).await?,
        None => app_state.db.get_all_payments().await?,
    };

    Ok(HttpResponse::Ok().json(payments))
}

#[get("/payments/{reference}")]
pub async fn get_payment_by_reference(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, PaymentError> {
    let reference = path.into_inner();

    let payment = app_state.db.get_payment(&reference).await?;
    let payment = payment.ok_or(PaymentError::NotFound(reference))?;

    Ok(HttpResponse::Ok().json(payment))
}
