mod db;
pub mod gateway;
mod schema;

pub use db::*;
pub use gateway::{GatewayError, GatewaySecret, GatewayVerification, PaymentGateway};
pub use schema::*;
