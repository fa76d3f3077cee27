//! Events exchanged by the saga participants.

use serde::{Deserialize, Serialize};

/// Account the ledger debits for every payment.
pub const DEFAULT_ACCOUNT_ID: i64 = 1;

/// Every event that can travel on the payments topic.
///
/// The payment's idempotency key is carried as the record key on the log,
/// not inside the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    /// The payment service asked for a payment.
    PaymentRequested(PaymentRequested),

    /// The ledger debited the paying account.
    AccountDebited(AccountDebited),

    /// The provider was asked to move the money.
    PayRequested(PayRequested),

    /// The provider confirmed the transfer.
    PayConfirmed(PayConfirmed),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentRequested {
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountDebited {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayRequested {
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayConfirmed {
    pub amount: i64,
}

impl PaymentEvent {
    pub fn payment_requested(amount: i64) -> Self {
        PaymentEvent::PaymentRequested(PaymentRequested { amount })
    }

    pub fn account_debited(account_id: i64, amount: i64) -> Self {
        PaymentEvent::AccountDebited(AccountDebited { account_id, amount })
    }

    pub fn pay_requested(amount: i64) -> Self {
        PaymentEvent::PayRequested(PayRequested { amount })
    }

    pub fn pay_confirmed(amount: i64) -> Self {
        PaymentEvent::PayConfirmed(PayConfirmed { amount })
    }

    /// Returns the type tag used on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRequested(_) => "PaymentRequested",
            PaymentEvent::AccountDebited(_) => "AccountDebited",
            PaymentEvent::PayRequested(_) => "PayRequested",
            PaymentEvent::PayConfirmed(_) => "PayConfirmed",
        }
    }

    /// Returns the integer fields in their declared order.
    pub fn fields(&self) -> Vec<i64> {
        match *self {
            PaymentEvent::PaymentRequested(e) => vec![e.amount],
            PaymentEvent::AccountDebited(e) => vec![e.account_id, e.amount],
            PaymentEvent::PayRequested(e) => vec![e.amount],
            PaymentEvent::PayConfirmed(e) => vec![e.amount],
        }
    }

    /// Returns the amount carried by the event.
    pub fn amount(&self) -> i64 {
        match *self {
            PaymentEvent::PaymentRequested(e) => e.amount,
            PaymentEvent::AccountDebited(e) => e.amount,
            PaymentEvent::PayRequested(e) => e.amount,
            PaymentEvent::PayConfirmed(e) => e.amount,
        }
    }
}

impl std::fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_type())?;
        for field in self.fields() {
            write!(f, ":{field}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types() {
        assert_eq!(
            PaymentEvent::payment_requested(1).event_type(),
            "PaymentRequested"
        );
        assert_eq!(
            PaymentEvent::account_debited(1, 1).event_type(),
            "AccountDebited"
        );
        assert_eq!(PaymentEvent::pay_requested(1).event_type(), "PayRequested");
        assert_eq!(PaymentEvent::pay_confirmed(1).event_type(), "PayConfirmed");
    }

    #[test]
    fn fields_follow_declared_order() {
        let event = PaymentEvent::account_debited(7, 100);
        assert_eq!(event.fields(), vec![7, 100]);
        assert_eq!(event.amount(), 100);
    }

    #[test]
    fn display_uses_tag_and_fields() {
        assert_eq!(
            PaymentEvent::account_debited(1, 100).to_string(),
            "AccountDebited:1:100"
        );
    }
}
