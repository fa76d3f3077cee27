//! Shared types for the payment saga workspace.

pub mod types;

pub use types::IdempotencyKey;
