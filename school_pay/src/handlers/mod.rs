mod payments;
use actix_web::{HttpResponse, Responder, get, web};
pub use payments::*;

use crate::error::PaymentError;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Welcome to School Pay Service!")
}

/// Registers every route on an app, shared by the server and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected JSON body: {}", err);
        PaymentError::Validation(format!("invalid JSON body: {err}")).into()
    }))
    .service(index)
    .service(verify_payment)
    .service(create_payment)
    .service(get_payments)
    .service(get_payment_by_reference);
}
