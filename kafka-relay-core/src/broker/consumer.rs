use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use serde_json::Value;
use tracing::info;

use super::{BatchConsumer, InboundRecord, PartitionBatch, PartitionPosition};
use crate::config::KafkaConfig;
use crate::error::Result;

/// rdkafka-backed [`BatchConsumer`].
///
/// Auto-commit is disabled; offsets move only through [`BatchConsumer::commit`],
/// which is how the inbound relay gets its at-least-once guarantee. A fresh
/// consumer group starts from the earliest retained offset.
pub struct KafkaBatchConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaBatchConsumer {
    /// Build the client and subscribe to the configured consume topic.
    pub fn connect(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("group.id", config.group_id.as_str())
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(&[config.consume_topic.as_str()])?;
        info!(
            topic = %config.consume_topic,
            group_id = %config.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: config.consume_topic.clone(),
        })
    }
}

#[async_trait]
impl BatchConsumer for KafkaBatchConsumer {
    async fn poll_batch(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<PartitionBatch>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut partitions: BTreeMap<i32, Vec<InboundRecord>> = BTreeMap::new();
        let mut fetched = 0;

        // Accumulate until the batch is full or the deadline passes,
        // whichever comes first. rdkafka delivers records of one partition
        // in offset order, so pushing preserves it.
        while fetched < max_records {
            let message = match tokio::time::timeout_at(deadline, self.consumer.recv()).await {
                Ok(received) => received?,
                Err(_) => break,
            };

            partitions
                .entry(message.partition())
                .or_default()
                .push(InboundRecord {
                    offset: message.offset(),
                    payload: decode_payload(message.payload())?,
                });
            fetched += 1;
        }

        Ok(partitions
            .into_iter()
            .map(|(partition, records)| PartitionBatch { partition, records })
            .collect())
    }

    async fn commit(&self, positions: &[PartitionPosition]) -> Result<()> {
        let list = positions_to_list(&self.topic, positions)?;
        self.consumer.commit(&list, CommitMode::Sync)?;
        Ok(())
    }
}

/// Decode a record payload as JSON. Valueless records (tombstones) map to
/// `null` rather than failing the batch.
fn decode_payload(payload: Option<&[u8]>) -> Result<Value> {
    match payload {
        Some(bytes) => Ok(serde_json::from_slice(bytes)?),
        None => Ok(Value::Null),
    }
}

fn positions_to_list(topic: &str, positions: &[PartitionPosition]) -> Result<TopicPartitionList> {
    let mut list = TopicPartitionList::with_capacity(positions.len());
    for position in positions {
        list.add_partition_offset(
            topic,
            position.partition,
            Offset::Offset(position.next_offset),
        )?;
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_payload() {
        let decoded = decode_payload(Some(br#"{"id": 7}"#)).unwrap();
        assert_eq!(decoded, json!({"id": 7}));

        assert_eq!(decode_payload(None).unwrap(), Value::Null);

        assert!(decode_payload(Some(b"not json")).is_err());
    }

    #[test]
    fn test_positions_to_list() {
        let positions = [
            PartitionPosition {
                partition: 0,
                next_offset: 13,
            },
            PartitionPosition {
                partition: 3,
                next_offset: 101,
            },
        ];

        let list = positions_to_list("events", &positions).unwrap();
        let elements = list.elements();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].topic(), "events");
        assert_eq!(elements[0].partition(), 0);
        assert_eq!(elements[0].offset(), Offset::Offset(13));
        assert_eq!(elements[1].partition(), 3);
        assert_eq!(elements[1].offset(), Offset::Offset(101));
    }
}
