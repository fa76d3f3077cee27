use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use common::IdempotencyKey;

use crate::{Offset, Record, RecordPosition, Result, TopicPartition};

/// Write side of the log.
///
/// Publishing never waits for consumers. Implementations must be thread-safe
/// so one producer can be shared by every handler of a participant.
#[async_trait]
pub trait EventProducer: Send + Sync {
    /// Appends a record to `topic`, routed to a partition by `key`.
    ///
    /// Fails only on transport errors. A failed publish may or may not have
    /// been appended; callers that retry must tolerate duplicates.
    async fn publish(
        &self,
        topic: &str,
        key: &IdempotencyKey,
        payload: String,
    ) -> Result<RecordPosition>;
}

/// Read side of the log, owned by exactly one participant.
///
/// A consumer tracks two positions per partition: the fetch position, moved
/// forward by [`poll`](EventConsumer::poll) and backward by
/// [`seek`](EventConsumer::seek), and the committed cursor, which belongs to
/// the consumer's group and survives the consumer itself.
#[async_trait]
pub trait EventConsumer: Send {
    /// Registers interest in `topics`. Calling it again with the same set is
    /// a no-op.
    async fn subscribe(&mut self, topics: &[String]) -> Result<()>;

    /// Waits up to `timeout` for records on the subscribed topics.
    ///
    /// Returns an empty batch on timeout. Within a partition, records are
    /// returned in offset order.
    async fn poll(&mut self, timeout: Duration) -> Result<ConsumerRecords>;

    /// Moves the fetch position of `tp` so the next poll starts at `offset`.
    async fn seek(&mut self, tp: &TopicPartition, offset: Offset) -> Result<()>;

    /// Records `next_offset` as the group's cursor for `tp`.
    async fn commit(&mut self, tp: &TopicPartition, next_offset: Offset) -> Result<()>;

    /// Returns the group's committed cursor for `tp`, if any.
    async fn committed(&self, tp: &TopicPartition) -> Result<Option<Offset>>;
}

/// Convenience methods for consumers.
#[async_trait]
pub trait EventConsumerExt: EventConsumer {
    /// Commits the cursor just past `record`.
    async fn commit_record(&mut self, record: &Record) -> Result<()> {
        self.commit(&record.topic_partition(), record.offset.next())
            .await
    }

    /// Rewinds the fetch position so `record` is delivered again.
    async fn rewind_to(&mut self, record: &Record) -> Result<()> {
        self.seek(&record.topic_partition(), record.offset).await
    }
}

impl<T: EventConsumer + ?Sized> EventConsumerExt for T {}

/// The result of one poll, grouped by partition.
#[derive(Debug, Clone, Default)]
pub struct ConsumerRecords {
    by_partition: BTreeMap<TopicPartition, Vec<Record>>,
}

impl ConsumerRecords {
    /// Creates an empty batch.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a record to its partition group. Records must be pushed in
    /// offset order.
    pub fn push(&mut self, record: Record) {
        self.by_partition
            .entry(record.topic_partition())
            .or_default()
            .push(record);
    }

    /// Returns true if the batch contains no records.
    pub fn is_empty(&self) -> bool {
        self.by_partition.values().all(Vec::is_empty)
    }

    /// Returns the total number of records across partitions.
    pub fn count(&self) -> usize {
        self.by_partition.values().map(Vec::len).sum()
    }

    /// Returns the partitions present in the batch.
    pub fn partitions(&self) -> impl Iterator<Item = &TopicPartition> {
        self.by_partition.keys()
    }

    /// Returns the records for one partition.
    pub fn records(&self, tp: &TopicPartition) -> &[Record] {
        self.by_partition.get(tp).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over every record, partition by partition.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.by_partition.values().flatten()
    }
}

impl IntoIterator for ConsumerRecords {
    type Item = (TopicPartition, Vec<Record>);
    type IntoIter = std::collections::btree_map::IntoIter<TopicPartition, Vec<Record>>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_partition.into_iter()
    }
}

/// Validates a topic name before it is used.
pub fn validate_topic(topic: &str) -> Result<()> {
    if topic.trim().is_empty() || topic.contains(char::is_whitespace) {
        return Err(crate::EventLogError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}
