//! Broker client seam
//!
//! The relays never talk to rdkafka directly. They are written against two
//! small async traits so the broker side can be swapped out in tests:
//! - [`BatchConsumer`]: batched poll plus explicit offset commit
//! - [`AckProducer`]: publish that resolves on broker acknowledgment
//!
//! [`KafkaBatchConsumer`] and [`KafkaAckProducer`] are the production
//! implementations backing both traits with rdkafka clients.

mod consumer;
mod producer;

pub use consumer::KafkaBatchConsumer;
pub use producer::KafkaAckProducer;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;

/// A single record fetched from the broker, payload already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRecord {
    pub offset: i64,
    pub payload: Value,
}

/// Records fetched from one partition in one poll, in offset order.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionBatch {
    pub partition: i32,
    pub records: Vec<InboundRecord>,
}

/// The next offset to read for one partition, as passed to
/// [`BatchConsumer::commit`]. For a batch whose highest seen offset is `n`,
/// `next_offset` is `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPosition {
    pub partition: i32,
    pub next_offset: i64,
}

/// Consumer side of the broker: subscribed to a single topic, polled in
/// bounded batches, offsets committed explicitly after delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchConsumer: Send + Sync {
    /// Fetch up to `max_records` records, waiting at most `timeout`.
    /// An empty result is normal and means nothing arrived in time.
    async fn poll_batch(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<PartitionBatch>>;

    /// Commit the given per-partition positions synchronously.
    async fn commit(&self, positions: &[PartitionPosition]) -> Result<()>;
}

/// Producer side of the broker. `publish` resolves only once the broker has
/// acknowledged the record under the configured durability policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AckProducer: Send + Sync {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<()>;
}
