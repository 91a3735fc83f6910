use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{Database, GatewayError, GatewayVerification, NewPayment, PaymentGateway};
use rust_decimal::Decimal;
use tokio::sync::Barrier;

/// Gateway double answering from a queue of scripted outcomes.
#[derive(Default)]
pub struct FakeGateway {
    outcomes: Mutex<VecDeque<Result<GatewayVerification, GatewayError>>>,
    calls: AtomicUsize,
    barrier: Option<Barrier>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, outcome: Result<GatewayVerification, GatewayError>) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    /// Holds every call until `n` calls are in flight.
    pub fn with_barrier(mut self, n: usize) -> Self {
        self.barrier = Some(Barrier::new(n));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| panic!("unexpected gateway call for {reference}"))
    }
}

pub async fn seeded_db(payments: &[(&str, Decimal)]) -> Database {
    let db = Database::in_memory().await.unwrap();
    for (reference, amount) in payments {
        let payment = NewPayment::new(reference, *amount, None).unwrap();
        db.save_payment(&payment).await.unwrap();
    }
    db
}
