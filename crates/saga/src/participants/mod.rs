//! The three services taking part in the payment saga.
//!
//! ```text
//! PaymentService ──PaymentRequested──► Ledger
//! Ledger ──AccountDebited──► PaymentProvider
//! PaymentProvider ──PayRequested──► PaymentProvider
//! PaymentProvider ──PayConfirmed──► PaymentService
//! ```

pub mod ledger;
pub mod payment_service;
pub mod provider;

use std::sync::Arc;

use async_trait::async_trait;
use common::IdempotencyKey;
use domain::PaymentEvent;
use event_log::{Offset, Record, TopicPartition};

use crate::error::Result;

pub use ledger::Ledger;
pub use payment_service::PaymentService;
pub use provider::PaymentProvider;

/// Where the event being handled came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub key: IdempotencyKey,
    pub topic_partition: TopicPartition,
    pub offset: Offset,
}

impl From<&Record> for RecordContext {
    fn from(record: &Record) -> Self {
        Self {
            key: record.key.clone(),
            topic_partition: record.topic_partition(),
            offset: record.offset,
        }
    }
}

/// A saga participant: reacts to events and emits follow-on events.
///
/// Handlers run at least once per record, so they must be safe to repeat.
/// Events a participant is not interested in must be ignored with `Ok(())`.
#[async_trait]
pub trait Participant: Send + Sync {
    /// Name used in logs, metrics and as the default consumer group id.
    fn name(&self) -> &'static str;

    /// Handles one event. An error makes the record be redelivered.
    async fn handle(&self, ctx: &RecordContext, event: PaymentEvent) -> Result<()>;
}

#[async_trait]
impl<T: Participant + ?Sized> Participant for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn handle(&self, ctx: &RecordContext, event: PaymentEvent) -> Result<()> {
        (**self).handle(ctx, event).await
    }
}
