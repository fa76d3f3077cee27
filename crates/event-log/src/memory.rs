use std::collections::{BTreeSet, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::IdempotencyKey;
use tokio::sync::{Notify, RwLock};

use crate::{
    ConsumerRecords, EventLogError, FaultPlan, Offset, Record, RecordPosition, Result,
    TopicPartition,
    log::{EventConsumer, EventProducer, validate_topic},
};

/// Partition count used when none is configured.
pub const DEFAULT_PARTITIONS: u32 = 3;

/// Upper bound on records returned per partition by one poll.
pub const DEFAULT_MAX_POLL_RECORDS: usize = 500;

#[derive(Default)]
struct LogState {
    topics: HashMap<String, Vec<Vec<Record>>>,
    committed: HashMap<(String, TopicPartition), Offset>,
}

/// In-memory partitioned log.
///
/// Provides the same guarantees the saga relies on from a real broker:
/// per-partition ordering, key-based routing, and group cursors that outlive
/// individual consumers. Clones share the same log.
#[derive(Clone)]
pub struct InMemoryEventLog {
    state: Arc<RwLock<LogState>>,
    appended: Arc<Notify>,
    partitions: u32,
    max_poll_records: usize,
    publish_faults: FaultPlan,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            appended: Arc::default(),
            partitions: DEFAULT_PARTITIONS,
            max_poll_records: DEFAULT_MAX_POLL_RECORDS,
            publish_faults: FaultPlan::default(),
        }
    }
}

impl InMemoryEventLog {
    /// Creates an empty log with the default partition count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the partition count for topics created from now on.
    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Bounds how many records per partition a single poll returns.
    pub fn with_max_poll_records(mut self, max: usize) -> Self {
        self.max_poll_records = max.max(1);
        self
    }

    /// Routes every publish through `plan`.
    pub fn with_publish_faults(mut self, plan: FaultPlan) -> Self {
        self.publish_faults = plan;
        self
    }

    /// Returns the partition count for new topics.
    pub fn partition_count(&self) -> u32 {
        self.partitions
    }

    /// Returns the partition `key` is routed to.
    pub fn partition_for(&self, key: &IdempotencyKey) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.as_str().hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions)) as u32
    }

    /// Creates a consumer belonging to `group_id`.
    ///
    /// A consumer starts from the group's committed cursors, or from the
    /// earliest offset of partitions the group has never committed.
    pub fn consumer(&self, group_id: impl Into<String>) -> InMemoryConsumer {
        InMemoryConsumer {
            log: self.clone(),
            group_id: group_id.into(),
            subscriptions: BTreeSet::new(),
            positions: HashMap::new(),
        }
    }

    /// Returns every record of `topic`, partition by partition.
    pub async fn records(&self, topic: &str) -> Vec<Record> {
        let state = self.state.read().await;
        state
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the records of `topic` carrying `key`, in publish order.
    pub async fn records_for_key(&self, topic: &str, key: &IdempotencyKey) -> Vec<Record> {
        let partition = self.partition_for(key);
        let state = self.state.read().await;
        state
            .topics
            .get(topic)
            .and_then(|partitions| partitions.get(partition as usize))
            .map(|records| records.iter().filter(|r| &r.key == key).cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the total number of records in `topic`.
    pub async fn record_count(&self, topic: &str) -> usize {
        let state = self.state.read().await;
        state
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Returns the committed cursor of `group_id` for `tp`.
    pub async fn committed_offset(&self, group_id: &str, tp: &TopicPartition) -> Option<Offset> {
        let state = self.state.read().await;
        state
            .committed
            .get(&(group_id.to_string(), tp.clone()))
            .copied()
    }

    async fn ensure_topic(&self, topic: &str) {
        let mut state = self.state.write().await;
        state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); self.partitions as usize]);
    }

    async fn append(
        &self,
        topic: &str,
        key: &IdempotencyKey,
        payload: String,
    ) -> Result<RecordPosition> {
        let partition = self.partition_for(key);

        let mut state = self.state.write().await;
        let partitions = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); self.partitions as usize]);
        let records = partitions
            .get_mut(partition as usize)
            .ok_or_else(|| EventLogError::InvalidTopic(topic.to_string()))?;

        let offset = Offset::new(records.len() as u64);
        records.push(Record {
            topic: topic.to_string(),
            partition,
            offset,
            key: key.clone(),
            payload,
            timestamp: Utc::now(),
        });
        drop(state);

        self.appended.notify_waiters();
        tracing::debug!(topic, partition, %offset, %key, "record appended");

        Ok(RecordPosition {
            topic_partition: TopicPartition::new(topic, partition),
            offset,
        })
    }
}

#[async_trait]
impl EventProducer for InMemoryEventLog {
    async fn publish(
        &self,
        topic: &str,
        key: &IdempotencyKey,
        payload: String,
    ) -> Result<RecordPosition> {
        validate_topic(topic)?;
        self.publish_faults
            .execute("publish", key, || self.append(topic, key, payload))
            .await
    }
}

/// Consumer handle for [`InMemoryEventLog`].
pub struct InMemoryConsumer {
    log: InMemoryEventLog,
    group_id: String,
    subscriptions: BTreeSet<String>,
    positions: HashMap<TopicPartition, Offset>,
}

impl InMemoryConsumer {
    /// Returns the consumer group this consumer commits for.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Returns the current fetch position for `tp`, if one has been set by a
    /// poll or seek.
    pub fn fetch_position(&self, tp: &TopicPartition) -> Option<Offset> {
        self.positions.get(tp).copied()
    }

    fn ensure_subscribed(&self, tp: &TopicPartition) -> Result<()> {
        if self.subscriptions.contains(&tp.topic) {
            Ok(())
        } else {
            Err(EventLogError::NotSubscribed(tp.clone()))
        }
    }

    async fn fetch(&mut self) -> ConsumerRecords {
        let mut batch = ConsumerRecords::empty();
        let state = self.log.state.read().await;

        for topic in &self.subscriptions {
            let Some(partitions) = state.topics.get(topic) else {
                continue;
            };
            for (partition, records) in partitions.iter().enumerate() {
                let tp = TopicPartition::new(topic.clone(), partition as u32);
                let start = self
                    .positions
                    .get(&tp)
                    .or_else(|| state.committed.get(&(self.group_id.clone(), tp.clone())))
                    .copied()
                    .unwrap_or_else(Offset::earliest);

                let fetched: Vec<Record> = records
                    .iter()
                    .skip(start.as_u64() as usize)
                    .take(self.log.max_poll_records)
                    .cloned()
                    .collect();

                if let Some(last) = fetched.last() {
                    self.positions.insert(tp, last.offset.next());
                }
                for record in fetched {
                    batch.push(record);
                }
            }
        }

        batch
    }
}

#[async_trait]
impl EventConsumer for InMemoryConsumer {
    async fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        for topic in topics {
            validate_topic(topic)?;
        }
        for topic in topics {
            if self.subscriptions.insert(topic.clone()) {
                self.log.ensure_topic(topic).await;
                tracing::debug!(group_id = %self.group_id, topic, "subscribed");
            }
        }
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<ConsumerRecords> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Registered before fetching so an append racing the fetch still wakes us.
            let notify = Arc::clone(&self.log.appended);
            let appended = notify.notified();

            let batch = self.fetch().await;
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(batch);
            }
        }
    }

    async fn seek(&mut self, tp: &TopicPartition, offset: Offset) -> Result<()> {
        self.ensure_subscribed(tp)?;
        tracing::debug!(group_id = %self.group_id, %tp, %offset, "seek");
        self.positions.insert(tp.clone(), offset);
        Ok(())
    }

    async fn commit(&mut self, tp: &TopicPartition, next_offset: Offset) -> Result<()> {
        self.ensure_subscribed(tp)?;
        let mut state = self.log.state.write().await;
        state
            .committed
            .insert((self.group_id.clone(), tp.clone()), next_offset);
        Ok(())
    }

    async fn committed(&self, tp: &TopicPartition) -> Result<Option<Offset>> {
        Ok(self.log.committed_offset(&self.group_id, tp).await)
    }
}
