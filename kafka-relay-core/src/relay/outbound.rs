use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::speed::ThroughputMeter;
use crate::broker::AckProducer;
use crate::error::Result;

/// Drains the outbound queue into the broker, one record in flight at a
/// time. Records are published in dequeue order and each publish waits for
/// the broker acknowledgment before the next dequeue.
pub struct OutboundRelay<P> {
    producer: Arc<P>,
    queue: mpsc::Receiver<Value>,
    topic: String,
    idle_wait: Duration,
    meter: ThroughputMeter,
}

impl<P: AckProducer> OutboundRelay<P> {
    pub fn new(
        producer: Arc<P>,
        queue: mpsc::Receiver<Value>,
        topic: String,
        idle_wait: Duration,
        log_interval: Duration,
    ) -> Self {
        let meter = ThroughputMeter::new(topic.clone(), log_interval);
        Self {
            producer,
            queue,
            topic,
            idle_wait,
            meter,
        }
    }

    /// Run until `cancel` is triggered, the queue closes, or a publish
    /// fails. The signal is checked between cycles only; an in-flight
    /// publish always completes.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(topic = %self.topic, "Outbound relay started");
        while !cancel.is_cancelled() {
            if !self.cycle().await? {
                break;
            }
        }
        info!(topic = %self.topic, "Outbound relay stopped");
        Ok(())
    }

    /// One dequeue-publish step. Waits at most `idle_wait` for a record;
    /// an empty window publishes nothing. Returns `false` once the queue
    /// is closed and drained.
    async fn cycle(&mut self) -> Result<bool> {
        self.meter.observe(self.queue.len());

        match timeout(self.idle_wait, self.queue.recv()).await {
            Err(_) => Ok(true),
            Ok(None) => {
                info!(topic = %self.topic, "Outbound queue closed");
                Ok(false)
            }
            Ok(Some(payload)) => {
                self.producer.publish(&self.topic, &payload).await?;
                self.meter.add(1);
                Ok(true)
            }
        }
    }
}
