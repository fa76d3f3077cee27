//! Domain error types.

use common::IdempotencyKey;
use thiserror::Error;

use crate::payment::Version;

/// Errors returned by a [`PaymentRepository`](crate::PaymentRepository).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A write lost the version check. Re-read the record and reconcile.
    #[error("Optimistic lock failed for payment {key}: attempted version {attempted}, stored version {current}")]
    OptimisticLock {
        key: IdempotencyKey,
        attempted: Version,
        current: Version,
    },
}

/// Errors produced when decoding an event payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The type tag does not name a payment event.
    #[error("Unknown event type: {0:?}")]
    UnknownType(String),

    /// The type tag is known but the fields do not match its layout.
    #[error("Malformed {event_type} payload: {reason}")]
    Malformed { event_type: String, reason: String },

    /// The payload is not valid JSON.
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;
