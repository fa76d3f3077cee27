use thiserror::Error;

use crate::TopicPartition;

/// Errors that can occur when interacting with the event log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventLogError {
    /// The log could not be reached, or the request was not acknowledged.
    ///
    /// Callers cannot tell whether the operation took effect.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The topic name is empty or otherwise unusable.
    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),

    /// A partition was referenced that the consumer is not subscribed to.
    #[error("Not subscribed to {0}")]
    NotSubscribed(TopicPartition),
}

/// Result type for event log operations.
pub type Result<T> = std::result::Result<T, EventLogError>;
