//! Payment service participant: owns the payment record.

use async_trait::async_trait;
use common::IdempotencyKey;
use domain::{
    PayConfirmed, Payment, PaymentEvent, PaymentRepository, PaymentRequest, PaymentRequested,
    PaymentResponse, SaveOutcome,
};
use event_log::EventProducer;

use super::{Participant, RecordContext};
use crate::error::{Result, SagaError};
use crate::publisher::EventPublisher;

/// Starts payments and records their completion.
///
/// Every state transition goes through the repository's version check, so
/// a payment is created once and marked paid once no matter how often the
/// triggering request or event is repeated.
pub struct PaymentService<P, R> {
    publisher: EventPublisher<P>,
    repository: R,
}

impl<P, R> PaymentService<P, R>
where
    P: EventProducer,
    R: PaymentRepository,
{
    pub fn new(publisher: EventPublisher<P>, repository: R) -> Self {
        Self {
            publisher,
            repository,
        }
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Starts a payment.
    ///
    /// The first call for a key stores a `PROCESSING` record and publishes
    /// `PaymentRequested`. Repeating the call for a payment that is still
    /// processing republishes the request; the downstream steps are
    /// idempotent. Repeating it for a paid payment does nothing.
    #[tracing::instrument(skip(self, request), fields(key = %request.idempotency_key, amount = request.amount))]
    pub async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentResponse> {
        let key = request.idempotency_key;
        let outcome = self
            .repository
            .save(Payment::processing(key.clone(), request.amount))
            .await?;

        match outcome {
            SaveOutcome::Saved(payment) => {
                tracing::info!(%payment, "payment created");
                self.publisher
                    .publish(&key, PaymentEvent::payment_requested(payment.amount))
                    .await?;
            }
            SaveOutcome::AlreadyExists(payment) if payment.is_paid() => {
                tracing::info!(%payment, "payment already completed");
            }
            SaveOutcome::AlreadyExists(payment) => {
                tracing::info!(%payment, "payment still processing, requesting again");
                self.publisher
                    .publish(&key, PaymentEvent::payment_requested(payment.amount))
                    .await?;
            }
        }

        Ok(PaymentResponse { id: key })
    }

    /// Returns the payment stored for `key`.
    pub async fn get_payment(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        Ok(self.repository.get(key).await?)
    }

    /// Returns every stored payment, ordered by key.
    pub async fn payments(&self) -> Result<Vec<Payment>> {
        Ok(self.repository.all().await?)
    }

    /// Makes sure a record exists for a payment requested by another
    /// producer of the topic.
    #[tracing::instrument(skip(self))]
    async fn on_payment_requested(
        &self,
        key: &IdempotencyKey,
        event: PaymentRequested,
    ) -> Result<()> {
        let outcome = self
            .repository
            .save(Payment::processing(key.clone(), event.amount))
            .await?;
        if outcome.is_saved() {
            tracing::info!(payment = %outcome.payment(), "payment recorded");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn on_pay_confirmed(&self, key: &IdempotencyKey, event: PayConfirmed) -> Result<()> {
        tracing::info!("handling PayConfirmed");

        let Some(current) = self.repository.get(key).await? else {
            tracing::warn!("no payment found for confirmation, skipping");
            return Ok(());
        };
        if current.is_paid() {
            tracing::info!(payment = %current, "payment already paid");
            return Ok(());
        }

        match self.repository.save(current.mark_paid()).await? {
            SaveOutcome::Saved(payment) => {
                metrics::counter!("payments_completed_total").increment(1);
                tracing::info!(%payment, "payment completed");
                Ok(())
            }
            SaveOutcome::AlreadyExists(payment) if payment.is_paid() => {
                tracing::info!(%payment, "payment completed concurrently");
                Ok(())
            }
            SaveOutcome::AlreadyExists(payment) => Err(SagaError::Conflict {
                key: payment.key,
                status: payment.status,
                version: payment.version,
            }),
        }
    }
}

#[async_trait]
impl<P, R> Participant for PaymentService<P, R>
where
    P: EventProducer,
    R: PaymentRepository,
{
    fn name(&self) -> &'static str {
        "payment-service"
    }

    async fn handle(&self, ctx: &RecordContext, event: PaymentEvent) -> Result<()> {
        match event {
            PaymentEvent::PaymentRequested(e) => self.on_payment_requested(&ctx.key, e).await,
            PaymentEvent::PayConfirmed(e) => self.on_pay_confirmed(&ctx.key, e).await,
            _ => Ok(()),
        }
    }
}
