//! Partitioned, ordered event log used by the payment saga.
//!
//! The saga participants only need four things from a log: publish, subscribe,
//! poll and seek. This crate defines that interface ([`EventProducer`],
//! [`EventConsumer`]) together with an in-memory broker that honours the same
//! guarantees as a log-structured broker: key-based partitioning, ordered
//! delivery within a partition, and per-group committed cursors.

pub mod error;
pub mod faults;
pub mod log;
pub mod memory;
pub mod record;

pub use common::IdempotencyKey;
pub use error::{EventLogError, Result};
pub use faults::{ConnectionBehaviour, FaultPlan};
pub use log::{ConsumerRecords, EventConsumer, EventConsumerExt, EventProducer};
pub use memory::{InMemoryConsumer, InMemoryEventLog};
pub use record::{Offset, Record, RecordPosition, TopicPartition};
