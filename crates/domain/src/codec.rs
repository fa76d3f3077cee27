//! Wire encodings for [`PaymentEvent`].
//!
//! Two encodings share the same contract, a type tag followed by integer
//! fields in declared order:
//!
//! - `Json`: `{"type":"AccountDebited","data":{"account_id":1,"amount":100}}`
//! - `Colon`: `AccountDebited:1:100`, the legacy positional form
//!
//! Decoding accepts either form.

use std::str::FromStr;

use crate::error::CodecError;
use crate::events::PaymentEvent;

/// Known type tags and their field counts.
const LAYOUTS: [(&str, usize); 4] = [
    ("PaymentRequested", 1),
    ("AccountDebited", 2),
    ("PayRequested", 1),
    ("PayConfirmed", 1),
];

/// Encoding used when publishing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Colon,
}

impl WireFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireFormat::Json => "json",
            WireFormat::Colon => "colon",
        }
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(WireFormat::Json),
            "colon" => Ok(WireFormat::Colon),
            other => Err(format!("unknown wire format: {other}")),
        }
    }
}

impl PaymentEvent {
    /// Encodes the event in `format`.
    pub fn encode(&self, format: WireFormat) -> Result<String, CodecError> {
        match format {
            WireFormat::Json => Ok(serde_json::to_string(self)?),
            WireFormat::Colon => Ok(self.to_string()),
        }
    }

    /// Decodes a payload in either wire format.
    pub fn decode(payload: &str) -> Result<Self, CodecError> {
        if payload.trim_start().starts_with('{') {
            decode_json(payload)
        } else {
            decode_colon(payload)
        }
    }
}

fn field_count(event_type: &str) -> Option<usize> {
    LAYOUTS
        .iter()
        .find(|(tag, _)| *tag == event_type)
        .map(|(_, count)| *count)
}

fn decode_json(payload: &str) -> Result<PaymentEvent, CodecError> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    let event_type = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CodecError::UnknownType(String::new()))?
        .to_string();

    if field_count(&event_type).is_none() {
        return Err(CodecError::UnknownType(event_type));
    }

    serde_json::from_value(value).map_err(|e| CodecError::Malformed {
        event_type,
        reason: e.to_string(),
    })
}

fn decode_colon(payload: &str) -> Result<PaymentEvent, CodecError> {
    let mut tokens = payload.trim().split(':');
    let event_type = tokens.next().unwrap_or_default().to_string();
    let expected = field_count(&event_type)
        .ok_or_else(|| CodecError::UnknownType(event_type.clone()))?;

    let fields = tokens
        .map(|token| {
            token.parse::<i64>().map_err(|e| CodecError::Malformed {
                event_type: event_type.clone(),
                reason: format!("field {token:?}: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if fields.len() != expected {
        return Err(CodecError::Malformed {
            event_type,
            reason: format!("expected {expected} fields, got {}", fields.len()),
        });
    }

    Ok(match (event_type.as_str(), fields.as_slice()) {
        ("PaymentRequested", [amount]) => PaymentEvent::payment_requested(*amount),
        ("AccountDebited", [account_id, amount]) => {
            PaymentEvent::account_debited(*account_id, *amount)
        }
        ("PayRequested", [amount]) => PaymentEvent::pay_requested(*amount),
        ("PayConfirmed", [amount]) => PaymentEvent::pay_confirmed(*amount),
        _ => return Err(CodecError::UnknownType(event_type)),
    })
}
