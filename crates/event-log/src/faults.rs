//! Scripted connection failures for exercising retry paths.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use common::IdempotencyKey;

use crate::EventLogError;

/// How a guarded call behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionBehaviour {
    /// The call goes through.
    #[default]
    Succeed,

    /// The call fails before reaching the remote side.
    FailBefore,

    /// The call takes effect, but the acknowledgement is lost.
    FailAfter,
}

#[derive(Debug, Default)]
struct Scripts {
    global: VecDeque<ConnectionBehaviour>,
    per_key: HashMap<IdempotencyKey, VecDeque<ConnectionBehaviour>>,
}

/// A shared script of connection behaviours.
///
/// Every guarded call consumes one behaviour: first from the script for its
/// key, then from the global script. Once both are exhausted calls succeed.
/// Clones share the same script.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    scripts: Arc<Mutex<Scripts>>,
}

impl FaultPlan {
    /// Creates a plan where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a plan that applies `behaviours` to the next calls, in order.
    pub fn with(behaviours: impl IntoIterator<Item = ConnectionBehaviour>) -> Self {
        let plan = Self::new();
        plan.lock().global.extend(behaviours);
        plan
    }

    /// Appends behaviours for calls made on behalf of `key`.
    pub fn script_key(
        &self,
        key: impl Into<IdempotencyKey>,
        behaviours: impl IntoIterator<Item = ConnectionBehaviour>,
    ) {
        self.lock()
            .per_key
            .entry(key.into())
            .or_default()
            .extend(behaviours);
    }

    /// Appends a behaviour to the global script.
    pub fn push(&self, behaviour: ConnectionBehaviour) {
        self.lock().global.push_back(behaviour);
    }

    /// Returns the number of scripted behaviours not yet consumed.
    pub fn remaining(&self) -> usize {
        let scripts = self.lock();
        scripts.global.len() + scripts.per_key.values().map(VecDeque::len).sum::<usize>()
    }

    /// Consumes the behaviour for the next call made on behalf of `key`.
    pub fn next_behaviour(&self, key: &IdempotencyKey) -> ConnectionBehaviour {
        let mut scripts = self.lock();
        if let Some(behaviour) = scripts
            .per_key
            .get_mut(key)
            .and_then(VecDeque::pop_front)
        {
            return behaviour;
        }
        scripts.global.pop_front().unwrap_or_default()
    }

    /// Runs `call` under the next scripted behaviour.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        key: &IdempotencyKey,
        call: F,
    ) -> Result<T, E>
    where
        E: From<EventLogError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.next_behaviour(key) {
            ConnectionBehaviour::Succeed => call().await,
            ConnectionBehaviour::FailBefore => {
                tracing::warn!(%key, operation, "injected failure before call");
                Err(EventLogError::Transport(format!("{operation}: failed before")).into())
            }
            ConnectionBehaviour::FailAfter => {
                call().await?;
                tracing::warn!(%key, operation, "injected failure after call");
                Err(EventLogError::Transport(format!("{operation}: failed after")).into())
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Scripts> {
        self.scripts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
