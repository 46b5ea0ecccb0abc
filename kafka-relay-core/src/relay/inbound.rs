use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::speed::ThroughputMeter;
use crate::broker::{BatchConsumer, PartitionBatch, PartitionPosition};
use crate::error::{Error, Result};

/// Moves records from the broker into the inbound queue.
///
/// Each cycle polls one bounded batch, enqueues every record in partition
/// offset order, then issues a single commit carrying the next-to-read
/// offset per partition. The commit comes strictly after all enqueues of
/// the cycle, so a crash in between causes redelivery rather than loss.
pub struct InboundRelay<C> {
    consumer: Arc<C>,
    queue: mpsc::Sender<Value>,
    topic: String,
    batch_size: usize,
    poll_timeout: Duration,
    meter: ThroughputMeter,
}

impl<C: BatchConsumer> InboundRelay<C> {
    pub fn new(
        consumer: Arc<C>,
        queue: mpsc::Sender<Value>,
        topic: String,
        batch_size: usize,
        poll_timeout: Duration,
        log_interval: Duration,
    ) -> Self {
        let meter = ThroughputMeter::new(topic.clone(), log_interval);
        Self {
            consumer,
            queue,
            topic,
            batch_size,
            poll_timeout,
            meter,
        }
    }

    /// Run until `cancel` is triggered or a cycle fails. The signal is
    /// checked between cycles only; an in-flight cycle always completes,
    /// including its commit.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(topic = %self.topic, "Inbound relay started");
        while !cancel.is_cancelled() {
            self.cycle().await?;
        }
        info!(topic = %self.topic, "Inbound relay stopped");
        Ok(())
    }

    async fn cycle(&mut self) -> Result<()> {
        self.meter.observe(queue_depth(&self.queue));

        let batch = self
            .consumer
            .poll_batch(self.batch_size, self.poll_timeout)
            .await?;

        let mut positions = Vec::with_capacity(batch.len());
        for PartitionBatch { partition, records } in batch {
            info!(
                topic = %self.topic,
                partition,
                count = records.len(),
                "Fetched partition batch"
            );
            let Some(last) = records.last() else {
                continue;
            };
            let next_offset = last.offset + 1;

            let delivered = records.len() as u64;
            for record in records {
                if self.queue.send(record.payload).await.is_err() {
                    return Err(Error::QueueClosed(
                        "inbound queue receiver dropped".to_string(),
                    ));
                }
            }
            self.meter.add(delivered);
            positions.push(PartitionPosition {
                partition,
                next_offset,
            });
        }

        // No records delivered means no offsets to move
        if positions.is_empty() {
            return Ok(());
        }

        // One commit per cycle, after every record of the batch is enqueued
        self.consumer.commit(&positions).await
    }
}

fn queue_depth(queue: &mpsc::Sender<Value>) -> usize {
    queue.max_capacity() - queue.capacity()
}
