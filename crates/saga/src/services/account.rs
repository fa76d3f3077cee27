//! Account service trait and in-memory implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::IdempotencyKey;
use event_log::FaultPlan;
use uuid::Uuid;

use super::RequestJournal;
use crate::error::SagaError;

/// Debit of one account on behalf of a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitRequest {
    pub idempotency_key: IdempotencyKey,
    pub account_id: i64,
    pub amount: i64,
}

/// Result of a successful debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitResponse {
    /// Transaction id assigned by the account service.
    pub transaction_id: String,
}

/// Trait for the external ledger the ledger participant debits.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Debits an account. Repeating a request with the same idempotency key
    /// returns the original response without debiting again.
    async fn debit(&self, request: DebitRequest) -> Result<DebitResponse, SagaError>;
}

/// In-memory account service for testing and the demo binary.
#[derive(Debug, Clone)]
pub struct InMemoryAccountService {
    journal: RequestJournal<DebitRequest, DebitResponse>,
    calls: Arc<AtomicUsize>,
    faults: FaultPlan,
}

impl Default for InMemoryAccountService {
    fn default() -> Self {
        Self {
            journal: RequestJournal::new("ledger"),
            calls: Arc::default(),
            faults: FaultPlan::default(),
        }
    }
}

impl InMemoryAccountService {
    /// Creates a new in-memory account service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every debit through `plan`.
    pub fn with_faults(mut self, plan: FaultPlan) -> Self {
        self.faults = plan;
        self
    }

    /// Returns the number of distinct debits applied.
    pub async fn debit_count(&self) -> usize {
        self.journal.len().await
    }

    /// Returns how many debit calls reached the service, duplicates included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the debit recorded for `key`.
    pub async fn debit_for(&self, key: &IdempotencyKey) -> Option<(DebitRequest, DebitResponse)> {
        self.journal.get(key).await
    }

    /// Returns every executed debit.
    pub async fn executed(&self) -> Vec<(DebitRequest, DebitResponse)> {
        self.journal.entries().await
    }
}

#[async_trait]
impl AccountService for InMemoryAccountService {
    async fn debit(&self, request: DebitRequest) -> Result<DebitResponse, SagaError> {
        let key = request.idempotency_key.clone();
        self.faults
            .execute("debit", &key, || async {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let response = self
                    .journal
                    .execute(&key, request, |_| DebitResponse {
                        transaction_id: Uuid::new_v4().to_string(),
                    })
                    .await;
                Ok(response)
            })
            .await
    }
}
