//! Payment domain for the saga.
//!
//! This crate provides:
//! - [`Payment`] and its two-state life cycle
//! - [`PaymentEvent`], the closed set of saga events, and its wire codec
//! - [`PaymentRepository`], the idempotent store participants use to apply
//!   each state transition once

pub mod codec;
pub mod error;
pub mod events;
pub mod payment;
pub mod repository;

pub use codec::WireFormat;
pub use common::IdempotencyKey;
pub use error::{CodecError, StoreError};
pub use events::{
    AccountDebited, DEFAULT_ACCOUNT_ID, PayConfirmed, PayRequested, PaymentEvent, PaymentRequested,
};
pub use payment::{Payment, PaymentRequest, PaymentResponse, PaymentStatus, Version};
pub use repository::{InMemoryPaymentRepository, PaymentRepository, SaveOutcome};
