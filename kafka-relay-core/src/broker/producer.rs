use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde_json::Value;
use tracing::debug;

use super::AckProducer;
use crate::config::KafkaConfig;
use crate::error::{Error, Result};

/// rdkafka-backed [`AckProducer`].
///
/// Configured with `acks=all`, so `publish` resolves only after every
/// in-sync replica has the record.
pub struct KafkaAckProducer {
    producer: FutureProducer,
}

impl KafkaAckProducer {
    pub fn connect(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("acks", "all")
            .create()?;

        Ok(Self { producer })
    }
}

#[async_trait]
impl AckProducer for KafkaAckProducer {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let record = FutureRecord::<(), Vec<u8>>::to(topic).payload(&body);

        let (partition, offset) = self
            .producer
            .send(record, Timeout::Never)
            .await
            .map_err(|(err, _)| Error::Kafka(err))?;
        debug!(topic, partition, offset, "Record acknowledged");

        Ok(())
    }
}
