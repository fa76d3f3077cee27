//! Ledger participant: debits the paying account.

use async_trait::async_trait;
use common::IdempotencyKey;
use domain::{DEFAULT_ACCOUNT_ID, PaymentEvent, PaymentRequested};
use event_log::EventProducer;

use super::{Participant, RecordContext};
use crate::error::Result;
use crate::publisher::EventPublisher;
use crate::services::{AccountService, DebitRequest};

/// Reacts to `PaymentRequested` by debiting the account and emitting
/// `AccountDebited`.
///
/// Redelivery is safe because the debit itself is idempotent by key; a
/// retried handler at worst republishes `AccountDebited`.
pub struct Ledger<P, A> {
    publisher: EventPublisher<P>,
    accounts: A,
    account_id: i64,
}

impl<P, A> Ledger<P, A>
where
    P: EventProducer,
    A: AccountService,
{
    pub fn new(publisher: EventPublisher<P>, accounts: A) -> Self {
        Self {
            publisher,
            accounts,
            account_id: DEFAULT_ACCOUNT_ID,
        }
    }

    /// Sets the account debited for every payment.
    pub fn with_account_id(mut self, account_id: i64) -> Self {
        self.account_id = account_id;
        self
    }

    #[tracing::instrument(skip(self))]
    async fn on_payment_requested(
        &self,
        key: &IdempotencyKey,
        event: PaymentRequested,
    ) -> Result<()> {
        tracing::info!("handling PaymentRequested");

        let debit = self
            .accounts
            .debit(DebitRequest {
                idempotency_key: key.clone(),
                account_id: self.account_id,
                amount: event.amount,
            })
            .await?;
        tracing::debug!(transaction_id = %debit.transaction_id, "account debited");

        self.publisher
            .publish(
                key,
                PaymentEvent::account_debited(self.account_id, event.amount),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<P, A> Participant for Ledger<P, A>
where
    P: EventProducer,
    A: AccountService,
{
    fn name(&self) -> &'static str {
        "ledger"
    }

    async fn handle(&self, ctx: &RecordContext, event: PaymentEvent) -> Result<()> {
        match event {
            PaymentEvent::PaymentRequested(e) => self.on_payment_requested(&ctx.key, e).await,
            _ => Ok(()),
        }
    }
}
