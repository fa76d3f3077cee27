//! Choreographed payment saga.
//!
//! No coordinator drives the saga. Each participant owns a consumer loop on
//! the shared payments topic and reacts to the events it cares about:
//!
//! 1. `PaymentService` stores the payment and publishes `PaymentRequested`
//! 2. `Ledger` debits the account and publishes `AccountDebited`
//! 3. `PaymentProvider` publishes `PayRequested`, pays, and publishes `PayConfirmed`
//! 4. `PaymentService` marks the payment paid
//!
//! Delivery is at least once, so every step is idempotent by the payment's
//! idempotency key. A failing handler is retried by redelivering its record.

pub mod consumer;
pub mod error;
pub mod participants;
pub mod publisher;
pub mod services;
pub mod state;

pub use consumer::{ConsumerLoop, ConsumerOptions, ConsumerStats, DEFAULT_TOPIC};
pub use error::{Result, SagaError};
pub use participants::{Ledger, Participant, PaymentProvider, PaymentService, RecordContext};
pub use publisher::EventPublisher;
pub use services::{
    AccountService, DebitRequest, DebitResponse, InMemoryAccountService, InMemoryPaymentGateway,
    PayRequest, PayResponse, PaymentGateway,
};
pub use state::ConsumerState;
