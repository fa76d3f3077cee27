//! Idempotent payment store with optimistic concurrency control.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::IdempotencyKey;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::payment::Payment;

/// Outcome of [`PaymentRepository::save`].
///
/// `AlreadyExists` is not a failure: it tells the caller that an equal or
/// newer write for the key already happened, and hands back the stored
/// record so the caller can decide whether its effect is still needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The write was accepted; carries the stored record.
    Saved(Payment),

    /// The write lost the version check; carries the current record.
    AlreadyExists(Payment),
}

impl SaveOutcome {
    /// Returns the record the store holds after the call.
    pub fn payment(&self) -> &Payment {
        match self {
            SaveOutcome::Saved(p) | SaveOutcome::AlreadyExists(p) => p,
        }
    }

    /// Consumes the outcome, returning the stored record.
    pub fn into_payment(self) -> Payment {
        match self {
            SaveOutcome::Saved(p) | SaveOutcome::AlreadyExists(p) => p,
        }
    }

    /// Returns true if the write was accepted.
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }

    /// Turns a lost version check into [`StoreError::OptimisticLock`].
    ///
    /// `attempted` is the version the caller tried to write.
    pub fn into_result(self, attempted: crate::Version) -> Result<Payment> {
        match self {
            SaveOutcome::Saved(p) => Ok(p),
            SaveOutcome::AlreadyExists(current) => Err(StoreError::OptimisticLock {
                key: current.key,
                attempted,
                current: current.version,
            }),
        }
    }
}

/// Keyed, versioned store of payments.
///
/// Implementations must make the version check and the write a single atomic
/// step: of several concurrent saves carrying the same version for one key,
/// exactly one may return [`SaveOutcome::Saved`].
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts `payment` if its key is new, or replaces the stored record if
    /// `payment.version` is greater than the stored version.
    async fn save(&self, payment: Payment) -> Result<SaveOutcome>;

    /// Returns the stored record for `key`.
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<Payment>>;

    /// Returns every stored record, ordered by key.
    async fn all(&self) -> Result<Vec<Payment>>;
}

/// In-memory payment store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<IdempotencyKey, Payment>>>,
}

impl InMemoryPaymentRepository {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored payments.
    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    #[tracing::instrument(skip(self, payment), fields(key = %payment.key, version = %payment.version))]
    async fn save(&self, payment: Payment) -> Result<SaveOutcome> {
        let mut payments = self.payments.write().await;

        match payments.get(&payment.key) {
            None => {
                tracing::debug!(status = %payment.status, "payment inserted");
                payments.insert(payment.key.clone(), payment.clone());
                Ok(SaveOutcome::Saved(payment))
            }
            Some(existing) if payment.version > existing.version => {
                tracing::debug!(
                    from = %existing.version,
                    status = %payment.status,
                    "payment updated"
                );
                payments.insert(payment.key.clone(), payment.clone());
                Ok(SaveOutcome::Saved(payment))
            }
            Some(existing) => {
                metrics::counter!("payment_store_conflicts_total").increment(1);
                tracing::info!(
                    stored = %existing.version,
                    stored_status = %existing.status,
                    "version check failed, payment already written"
                );
                Ok(SaveOutcome::AlreadyExists(existing.clone()))
            }
        }
    }

    async fn get(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(key).cloned())
    }

    async fn all(&self) -> Result<Vec<Payment>> {
        let mut all: Vec<_> = self.payments.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}
