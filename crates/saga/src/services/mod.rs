//! External service traits and in-memory implementations used by the
//! participants.
//!
//! Both services are idempotent by key: a repeated request for a key that
//! was already executed returns the original response instead of running
//! again.

pub mod account;
pub mod gateway;

use std::collections::HashMap;
use std::sync::Arc;

use common::IdempotencyKey;
use tokio::sync::RwLock;

pub use account::{AccountService, DebitRequest, DebitResponse, InMemoryAccountService};
pub use gateway::{InMemoryPaymentGateway, PayRequest, PayResponse, PaymentGateway};

/// Executed requests of a service, keyed by idempotency key.
#[derive(Debug)]
pub(crate) struct RequestJournal<Req, Resp> {
    name: &'static str,
    executed: Arc<RwLock<HashMap<IdempotencyKey, (Req, Resp)>>>,
}

impl<Req, Resp> Clone for RequestJournal<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            executed: Arc::clone(&self.executed),
        }
    }
}

impl<Req, Resp> RequestJournal<Req, Resp>
where
    Req: Clone + std::fmt::Debug,
    Resp: Clone + std::fmt::Debug,
{
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            executed: Arc::default(),
        }
    }

    /// Returns the recorded response for `key`, or records the one produced
    /// by `respond`.
    pub(crate) async fn execute(
        &self,
        key: &IdempotencyKey,
        request: Req,
        respond: impl FnOnce(&Req) -> Resp,
    ) -> Resp {
        let mut executed = self.executed.write().await;
        if let Some((_, response)) = executed.get(key) {
            tracing::info!(service = self.name, %key, ?response, "request already executed");
            return response.clone();
        }

        tracing::info!(service = self.name, %key, ?request, "executing request");
        let response = respond(&request);
        executed.insert(key.clone(), (request, response.clone()));
        tracing::info!(service = self.name, %key, ?response, "sending response");
        response
    }

    pub(crate) async fn len(&self) -> usize {
        self.executed.read().await.len()
    }

    pub(crate) async fn get(&self, key: &IdempotencyKey) -> Option<(Req, Resp)> {
        self.executed.read().await.get(key).cloned()
    }

    pub(crate) async fn entries(&self) -> Vec<(Req, Resp)> {
        self.executed.read().await.values().cloned().collect()
    }
}
