use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use common::{GatewayError, InvalidPayment, StoreError};
use serde::Serialize;

/// Every failure a payment endpoint can answer with.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),
    #[error("payment with reference `{0}` not found")]
    NotFound(String),
    #[error("{0}")]
    VerificationFailed(String),
    #[error("payment gateway is unavailable, please retry later")]
    GatewayUnavailable,
    #[error("payment gateway returned an unexpected response")]
    GatewayProtocol,
    #[error("payment with reference `{0}` already exists")]
    Conflict(String),
    #[error("internal server error")]
    Internal,
}

impl PaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "validation_error",
            PaymentError::NotFound(_) => "not_found",
            PaymentError::VerificationFailed(_) => "verification_failed",
            PaymentError::GatewayUnavailable => "gateway_unavailable",
            PaymentError::GatewayProtocol => "gateway_protocol_error",
            PaymentError::Conflict(_) => "conflict",
            PaymentError::Internal => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl ResponseError for PaymentError {
    fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation(_) | PaymentError::VerificationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::Conflict(_) => StatusCode::CONFLICT,
            PaymentError::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::GatewayProtocol => StatusCode::BAD_GATEWAY,
            PaymentError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            code: self.code(),
        })
    }
}

impl From<InvalidPayment> for PaymentError {
    fn from(err: InvalidPayment) -> Self {
        PaymentError::Validation(err.to_string())
    }
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(reference) => PaymentError::Conflict(reference),
            other => {
                log::error!("Payment store failure: {}", other);
                PaymentError::Internal
            }
        }
    }
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        log::error!("Payment gateway failure: {}", err);
        match err {
            GatewayError::Unavailable { .. } => PaymentError::GatewayUnavailable,
            GatewayError::Protocol(_) => PaymentError::GatewayProtocol,
            GatewayError::Config(_) => PaymentError::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn error_body_carries_message_and_code() {
        let response = PaymentError::NotFound("REF1".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "not_found");
        assert_eq!(json["error"], "payment with reference `REF1` not found");
    }

    #[test]
    fn gateway_errors_map_to_distinct_statuses() {
        let unavailable = PaymentError::from(GatewayError::Unavailable {
            attempts: 3,
            reason: "connection refused".to_string(),
        });
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let protocol = PaymentError::from(GatewayError::Protocol("missing `data`".to_string()));
        assert_eq!(protocol.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(protocol.code(), "gateway_protocol_error");

        let refused = PaymentError::from(GatewayError::Config(
            "gateway rejected credentials (HTTP 401 Unauthorized): Invalid key".to_string(),
        ));
        assert_eq!(refused.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(refused.to_string(), "internal server error");
    }

    #[test]
    fn store_conflict_keeps_its_kind() {
        let err = PaymentError::from(StoreError::Conflict("REF1".to_string()));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = PaymentError::from(StoreError::Corrupt {
            reference: "REF1".to_string(),
            reason: "amount `abc`".to_string(),
        });
        assert_eq!(err.to_string(), "internal server error");
    }
}
