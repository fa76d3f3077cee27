use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-supplied identifier for one logical payment.
///
/// Every event belonging to the same payment carries the same key. The key
/// doubles as the log partitioning key, so all events of one saga instance
/// are strictly ordered on a single partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a new random key.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for IdempotencyKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_unique_keys() {
        let k1 = IdempotencyKey::new();
        let k2 = IdempotencyKey::new();
        assert_ne!(k1, k2);
        assert!(Uuid::parse_str(k1.as_str()).is_ok());
    }

    #[test]
    fn from_str_preserves_value() {
        let key = IdempotencyKey::from("abc");
        assert_eq!(key.as_str(), "abc");
        assert_eq!(key.to_string(), "abc");
    }

    #[test]
    fn serializes_as_plain_string() {
        let key = IdempotencyKey::from("abc");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: IdempotencyKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
