//! Payment provider participant.

use async_trait::async_trait;
use common::IdempotencyKey;
use domain::{AccountDebited, PayRequested, PaymentEvent};
use event_log::EventProducer;

use super::{Participant, RecordContext};
use crate::error::Result;
use crate::publisher::EventPublisher;
use crate::services::{PayRequest, PaymentGateway};

/// Turns `AccountDebited` into `PayRequested`, then executes the transfer
/// and confirms it with `PayConfirmed`.
///
/// Both steps may run more than once; duplicate confirmations are absorbed
/// by the payment service.
pub struct PaymentProvider<P, G> {
    publisher: EventPublisher<P>,
    gateway: G,
}

impl<P, G> PaymentProvider<P, G>
where
    P: EventProducer,
    G: PaymentGateway,
{
    pub fn new(publisher: EventPublisher<P>, gateway: G) -> Self {
        Self { publisher, gateway }
    }

    #[tracing::instrument(skip(self))]
    async fn on_account_debited(&self, key: &IdempotencyKey, event: AccountDebited) -> Result<()> {
        tracing::info!("handling AccountDebited");
        self.publisher
            .publish(key, PaymentEvent::pay_requested(event.amount))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn on_pay_requested(&self, key: &IdempotencyKey, event: PayRequested) -> Result<()> {
        tracing::info!("handling PayRequested");

        let transfer = self
            .gateway
            .pay(PayRequest {
                idempotency_key: key.clone(),
                amount: event.amount,
            })
            .await?;
        tracing::debug!(transaction_id = %transfer.transaction_id, "transfer executed");

        self.publisher
            .publish(key, PaymentEvent::pay_confirmed(event.amount))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<P, G> Participant for PaymentProvider<P, G>
where
    P: EventProducer,
    G: PaymentGateway,
{
    fn name(&self) -> &'static str {
        "payment-provider"
    }

    async fn handle(&self, ctx: &RecordContext, event: PaymentEvent) -> Result<()> {
        match event {
            PaymentEvent::AccountDebited(e) => self.on_account_debited(&ctx.key, e).await,
            PaymentEvent::PayRequested(e) => self.on_pay_requested(&ctx.key, e).await,
            _ => Ok(()),
        }
    }
}
