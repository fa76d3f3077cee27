//! Publishing saga events onto the log.

use common::IdempotencyKey;
use domain::{PaymentEvent, WireFormat};
use event_log::{EventProducer, RecordPosition};

use crate::error::Result;

/// Encodes [`PaymentEvent`]s and publishes them to one topic, keyed by the
/// payment's idempotency key.
#[derive(Debug, Clone)]
pub struct EventPublisher<P> {
    producer: P,
    topic: String,
    format: WireFormat,
}

impl<P: EventProducer> EventPublisher<P> {
    /// Creates a publisher for `topic` using the default wire format.
    pub fn new(producer: P, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
            format: WireFormat::default(),
        }
    }

    /// Sets the wire format used for encoding.
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the topic events are published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the wire format in use.
    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Publishes `event` for the payment identified by `key`.
    #[tracing::instrument(skip(self, event), fields(topic = %self.topic, event = %event))]
    pub async fn publish(
        &self,
        key: &IdempotencyKey,
        event: PaymentEvent,
    ) -> Result<RecordPosition> {
        let payload = event.encode(self.format)?;
        let position = self.producer.publish(&self.topic, key, payload).await?;

        metrics::counter!("saga_events_published_total", "event_type" => event.event_type())
            .increment(1);
        tracing::info!(
            partition = position.topic_partition.partition,
            offset = %position.offset,
            "event published"
        );

        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_log::InMemoryEventLog;

    #[tokio::test]
    async fn test_publish_encodes_in_configured_format() {
        let log = InMemoryEventLog::new();
        let key = IdempotencyKey::from("abc");

        let json = EventPublisher::new(log.clone(), "payments");
        let colon = EventPublisher::new(log.clone(), "payments").with_format(WireFormat::Colon);
        json.publish(&key, PaymentEvent::pay_requested(100))
            .await
            .unwrap();
        colon
            .publish(&key, PaymentEvent::pay_confirmed(100))
            .await
            .unwrap();

        let records = log.records_for_key("payments", &key).await;
        assert_eq!(records.len(), 2);
        assert!(records[0].payload.starts_with('{'));
        assert_eq!(records[1].payload, "PayConfirmed:100");
        assert_eq!(
            PaymentEvent::decode(&records[0].payload).unwrap(),
            PaymentEvent::pay_requested(100)
        );
    }

    #[tokio::test]
    async fn test_publish_surfaces_transport_errors() {
        let plan = event_log::FaultPlan::with([event_log::ConnectionBehaviour::FailBefore]);
        let log = InMemoryEventLog::new().with_publish_faults(plan);
        let publisher = EventPublisher::new(log, "payments");

        let result = publisher
            .publish(&IdempotencyKey::from("abc"), PaymentEvent::pay_requested(1))
            .await;
        assert!(matches!(result, Err(crate::SagaError::Transport(_))));
    }
}
