use chrono::{DateTime, Utc};
use common::IdempotencyKey;
use serde::{Deserialize, Serialize};

/// Position of a record within a single partition.
///
/// Offsets start at 0 and increase by one for every record appended to the
/// partition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(u64);

impl Offset {
    /// Creates an offset from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The first offset of every partition.
    pub fn earliest() -> Self {
        Self(0)
    }

    /// Returns the offset immediately after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw offset value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Offset {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A (topic, partition) pair, the unit of ordering in the log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Where a published record landed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordPosition {
    pub topic_partition: TopicPartition,
    pub offset: Offset,
}

/// A record as stored in, and delivered from, the log.
///
/// Records are immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Topic the record was published to.
    pub topic: String,

    /// Partition chosen from the record key.
    pub partition: u32,

    /// Offset within the partition.
    pub offset: Offset,

    /// Partitioning key, the payment's idempotency key.
    pub key: IdempotencyKey,

    /// Encoded event payload.
    pub payload: String,

    /// When the record was appended.
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Returns the (topic, partition) this record belongs to.
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_ordering() {
        let o1 = Offset::new(1);
        let o2 = Offset::new(2);
        assert!(o1 < o2);
        assert_eq!(o1.next(), o2);
        assert_eq!(Offset::earliest().as_u64(), 0);
    }

    #[test]
    fn topic_partition_display() {
        let tp = TopicPartition::new("payments", 2);
        assert_eq!(tp.to_string(), "payments-2");
    }

    #[test]
    fn topic_partition_orders_by_topic_then_partition() {
        let a = TopicPartition::new("a", 5);
        let b0 = TopicPartition::new("b", 0);
        let b1 = TopicPartition::new("b", 1);
        let mut tps = vec![b1.clone(), a.clone(), b0.clone()];
        tps.sort();
        assert_eq!(tps, vec![a, b0, b1]);
    }
}
