//! Payment gateway trait and in-memory implementation.

use async_trait::async_trait;
use common::IdempotencyKey;
use event_log::FaultPlan;
use uuid::Uuid;

use super::RequestJournal;
use crate::error::SagaError;

/// Transfer request sent to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayRequest {
    pub idempotency_key: IdempotencyKey,
    pub amount: i64,
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayResponse {
    /// Transaction id assigned by the gateway.
    pub transaction_id: String,
}

/// Trait for the gateway the payment provider moves money through.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Executes a transfer. Idempotent by key.
    async fn pay(&self, request: PayRequest) -> Result<PayResponse, SagaError>;
}

/// In-memory payment gateway for testing and the demo binary.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    journal: RequestJournal<PayRequest, PayResponse>,
    faults: FaultPlan,
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self {
            journal: RequestJournal::new("payment-gateway"),
            faults: FaultPlan::default(),
        }
    }
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every transfer through `plan`.
    pub fn with_faults(mut self, plan: FaultPlan) -> Self {
        self.faults = plan;
        self
    }

    /// Returns the number of distinct transfers executed.
    pub async fn payment_count(&self) -> usize {
        self.journal.len().await
    }

    /// Returns every executed transfer.
    pub async fn executed(&self) -> Vec<(PayRequest, PayResponse)> {
        self.journal.entries().await
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn pay(&self, request: PayRequest) -> Result<PayResponse, SagaError> {
        let key = request.idempotency_key.clone();
        self.faults
            .execute("pay", &key, || async {
                Ok(self
                    .journal
                    .execute(&key, request, |_| PayResponse {
                        transaction_id: Uuid::new_v4().to_string(),
                    })
                    .await)
            })
            .await
    }
}
