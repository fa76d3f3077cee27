//! Application error types.

use saga::SagaError;
use thiserror::Error;

/// Errors raised while configuring or running the application.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable held a value that could not be used.
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Config {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// Logging or metrics could not be installed.
    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),

    /// A saga operation failed.
    #[error(transparent)]
    Saga(#[from] SagaError),

    /// A consumer task panicked or was cancelled.
    #[error("Consumer task {name} did not finish cleanly: {reason}")]
    Task { name: &'static str, reason: String },
}

/// Convenience type alias for application results.
pub type Result<T> = std::result::Result<T, AppError>;
