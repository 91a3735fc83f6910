mod payment;

pub use payment::*;
