//! Consumer loop state machine.

use serde::{Deserialize, Serialize};

/// The state of a participant's consumer loop.
///
/// State transitions:
/// ```text
/// Polling ──► Dispatching ──┬──► Advancing ──► Dispatching | Polling
///                           └──► Retrying  ──► Polling
/// ```
/// `Stopped` is entered once, after a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConsumerState {
    /// Waiting for the next batch.
    #[default]
    Polling,

    /// A record is being handled.
    Dispatching,

    /// The handler succeeded and the cursor moves past the record.
    Advancing,

    /// The handler failed; backing off before the record is redelivered.
    Retrying,

    /// The loop has exited (terminal state).
    Stopped,
}

impl ConsumerState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsumerState::Stopped)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::Polling => "Polling",
            ConsumerState::Dispatching => "Dispatching",
            ConsumerState::Advancing => "Advancing",
            ConsumerState::Retrying => "Retrying",
            ConsumerState::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_polling() {
        assert_eq!(ConsumerState::default(), ConsumerState::Polling);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ConsumerState::Polling.is_terminal());
        assert!(!ConsumerState::Dispatching.is_terminal());
        assert!(!ConsumerState::Advancing.is_terminal());
        assert!(!ConsumerState::Retrying.is_terminal());
        assert!(ConsumerState::Stopped.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConsumerState::Polling.to_string(), "Polling");
        assert_eq!(ConsumerState::Retrying.to_string(), "Retrying");
        assert_eq!(ConsumerState::Stopped.to_string(), "Stopped");
    }

    #[test]
    fn test_serialization() {
        let state = ConsumerState::Retrying;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: ConsumerState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
