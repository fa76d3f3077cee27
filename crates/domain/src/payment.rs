//! The payment record and its life cycle.

use common::IdempotencyKey;
use serde::{Deserialize, Serialize};

/// Version of a stored payment, used for optimistic concurrency control.
///
/// A payment is created at version 0 and every accepted write must carry a
/// strictly greater version than the stored one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The baseline version of a newly created payment.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Where a payment is in its life cycle.
///
/// ```text
/// Processing ──► Paid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// The saga is in flight.
    #[default]
    Processing,

    /// The provider confirmed the payment (terminal).
    Paid,
}

impl PaymentStatus {
    /// Returns true if this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Paid => "PAID",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment as kept by the payment service. Identity is `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub key: IdempotencyKey,
    pub amount: i64,
    pub status: PaymentStatus,
    pub version: Version,
}

impl Payment {
    /// Creates the version-0 record of a payment that has just been requested.
    pub fn processing(key: IdempotencyKey, amount: i64) -> Self {
        Self {
            key,
            amount,
            status: PaymentStatus::Processing,
            version: Version::initial(),
        }
    }

    /// Returns the successor record: status `Paid`, version bumped by one.
    pub fn mark_paid(&self) -> Self {
        Self {
            status: PaymentStatus::Paid,
            version: self.version.next(),
            ..self.clone()
        }
    }

    /// Returns true once the payment reached its terminal state.
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

impl std::fmt::Display for Payment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Payment(key={}, amount={}, status={}, version={})",
            self.key, self.amount, self.status, self.version
        )
    }
}

/// A request to start a payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub idempotency_key: IdempotencyKey,
    pub amount: i64,
}

impl PaymentRequest {
    pub fn new(idempotency_key: impl Into<IdempotencyKey>, amount: i64) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            amount,
        }
    }
}

/// The answer to a [`PaymentRequest`]; `id` is the payment's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: IdempotencyKey,
}
