//! Saga error types.

use common::IdempotencyKey;
use domain::{CodecError, PaymentStatus, StoreError, Version};
use event_log::EventLogError;
use thiserror::Error;

/// Errors that can occur while a participant handles an event.
///
/// Any of these returned from a handler makes the consumer loop rewind and
/// redeliver the record.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The log, or an external service, could not be reached.
    #[error("Transport error: {0}")]
    Transport(#[from] EventLogError),

    /// The payment store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An event payload could not be decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// An external service rejected the request.
    #[error("{service} error: {reason}")]
    ExternalService {
        service: &'static str,
        reason: String,
    },

    /// Another writer moved the payment to a state this handler cannot
    /// reconcile with.
    #[error("Conflicting write for payment {key}: stored status {status} at version {version}")]
    Conflict {
        key: IdempotencyKey,
        status: PaymentStatus,
        version: Version,
    },
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
