//! The consumer loop that drives one participant.

use std::time::Duration;

use domain::PaymentEvent;
use event_log::{EventConsumer, EventConsumerExt, Record, TopicPartition};
use tokio::sync::watch;

use crate::error::Result;
use crate::participants::{Participant, RecordContext};
use crate::state::ConsumerState;

/// Topic the saga events travel on unless configured otherwise.
pub const DEFAULT_TOPIC: &str = "payments";

/// Options for a [`ConsumerLoop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Topics to subscribe to.
    pub topics: Vec<String>,

    /// How long a single poll waits for records.
    pub poll_timeout: Duration,

    /// Pause before a failed record is redelivered.
    pub retry_backoff: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            topics: vec![DEFAULT_TOPIC.to_string()],
            poll_timeout: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl ConsumerOptions {
    /// Creates options subscribing to a single topic.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
            ..Self::default()
        }
    }

    pub fn with_topics(mut self, topics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Counters reported by a finished [`ConsumerLoop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Records the participant handled successfully.
    pub handled: u64,

    /// Handler attempts that failed and caused a redelivery.
    pub failures: u64,

    /// Records skipped because their payload could not be decoded.
    pub skipped: u64,
}

/// Polls a consumer and feeds every record to one participant.
///
/// Delivery is at least once. A record's offset is committed only after the
/// participant handled it; when handling fails the loop backs off, seeks the
/// partition back to the failing record and drops the rest of that
/// partition's batch, so the next poll redelivers it in order. Other
/// partitions of the same batch keep going.
///
/// The backoff pauses the whole loop, not just the failing partition. While
/// one partition keeps failing, the others still advance but receive at most
/// one batch per `retry_backoff`.
///
/// The loop runs until the shutdown flag flips to `true`. Waiting for records
/// and backing off are interrupted by shutdown; a handler call in flight is
/// allowed to finish.
pub struct ConsumerLoop<C, H> {
    name: &'static str,
    consumer: C,
    participant: H,
    options: ConsumerOptions,
    state: watch::Sender<ConsumerState>,
    stats: ConsumerStats,
}

impl<C, H> ConsumerLoop<C, H>
where
    C: EventConsumer,
    H: Participant,
{
    pub fn new(consumer: C, participant: H, options: ConsumerOptions) -> Self {
        let (state, _) = watch::channel(ConsumerState::default());
        Self {
            name: participant.name(),
            consumer,
            participant,
            options,
            state,
            stats: ConsumerStats::default(),
        }
    }

    /// Returns the name of the participant being driven.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns a receiver that observes the loop's state.
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Runs the loop until shutdown is requested.
    ///
    /// Fails only if the initial subscription fails.
    #[tracing::instrument(skip_all, fields(participant = self.name))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<ConsumerStats> {
        self.consumer.subscribe(&self.options.topics).await?;
        tracing::info!(topics = ?self.options.topics, "consumer loop started");

        'poll: while !*shutdown.borrow() {
            self.set_state(ConsumerState::Polling);

            let polled = tokio::select! {
                polled = self.consumer.poll(self.options.poll_timeout) => polled,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let batch = match polled {
                Ok(batch) => batch,
                Err(error) => {
                    tracing::warn!(%error, "poll failed");
                    if !backoff(self.options.retry_backoff, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            for (tp, records) in batch {
                if !self.process_partition(&tp, records, &mut shutdown).await {
                    break 'poll;
                }
            }
        }

        self.set_state(ConsumerState::Stopped);
        tracing::info!(
            handled = self.stats.handled,
            failures = self.stats.failures,
            skipped = self.stats.skipped,
            "consumer loop stopped"
        );
        Ok(self.stats)
    }

    /// Handles one partition's share of a batch. Returns false if shutdown
    /// was requested while backing off.
    async fn process_partition(
        &mut self,
        tp: &TopicPartition,
        records: Vec<Record>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        for record in records {
            self.set_state(ConsumerState::Dispatching);
            let ctx = RecordContext::from(&record);

            let event = match PaymentEvent::decode(&record.payload) {
                Ok(event) => event,
                Err(error) => {
                    tracing::warn!(
                        %tp,
                        offset = %record.offset,
                        key = %record.key,
                        %error,
                        "skipping undecodable record"
                    );
                    metrics::counter!("saga_records_skipped_total", "participant" => self.name)
                        .increment(1);
                    self.stats.skipped += 1;
                    self.commit(&record).await;
                    continue;
                }
            };

            match self.participant.handle(&ctx, event).await {
                Ok(()) => {
                    self.set_state(ConsumerState::Advancing);
                    metrics::counter!("saga_records_handled_total", "participant" => self.name)
                        .increment(1);
                    self.stats.handled += 1;
                    self.commit(&record).await;
                }
                Err(error) => {
                    self.set_state(ConsumerState::Retrying);
                    tracing::warn!(
                        %tp,
                        offset = %record.offset,
                        key = %record.key,
                        %event,
                        %error,
                        "handler failed, record will be redelivered"
                    );
                    metrics::counter!("saga_handler_failures_total", "participant" => self.name)
                        .increment(1);
                    self.stats.failures += 1;

                    return self.rewind(tp, &record, shutdown).await;
                }
            }
        }
        true
    }

    /// Backs off, then seeks `tp` back to `record`. A failed seek is retried
    /// after another backoff; the partition never moves past `record` until
    /// the seek lands. Returns false if shutdown was requested first.
    async fn rewind(
        &mut self,
        tp: &TopicPartition,
        record: &Record,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        while backoff(self.options.retry_backoff, shutdown).await {
            match self.consumer.rewind_to(record).await {
                Ok(()) => return true,
                Err(error) => {
                    tracing::error!(%tp, offset = %record.offset, %error, "seek failed, retrying");
                    metrics::counter!("saga_seek_failures_total", "participant" => self.name)
                        .increment(1);
                }
            }
        }
        false
    }

    async fn commit(&mut self, record: &Record) {
        // A lost commit only widens the redelivery window.
        if let Err(error) = self.consumer.commit_record(record).await {
            tracing::warn!(tp = %record.topic_partition(), offset = %record.offset, %error, "commit failed");
        }
    }

    fn set_state(&self, state: ConsumerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::trace!(from = %previous, to = %state, "consumer state");
        }
    }
}

/// Sleeps for `duration`. Returns false if shutdown was requested meanwhile.
async fn backoff(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
    }
}
