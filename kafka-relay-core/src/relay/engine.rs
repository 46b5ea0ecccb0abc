use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::inbound::InboundRelay;
use super::outbound::OutboundRelay;
use crate::broker::{AckProducer, BatchConsumer};
use crate::error::{Error, Result};

/// Engine tuning, assembled by the caller from its own configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Topic the inbound relay consumes from
    pub consume_topic: String,
    /// Topic the outbound relay publishes to
    pub produce_topic: String,
    /// Maximum records fetched per inbound poll
    pub batch_size: usize,
    /// Upper bound on one inbound poll
    pub poll_timeout: Duration,
    /// How long the outbound relay waits on an empty queue per cycle
    pub idle_wait: Duration,
    /// Capacity of each local queue
    pub queue_capacity: usize,
    /// Interval between throughput log lines per direction
    pub log_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            consume_topic: "inbound".to_string(),
            produce_topic: "outbound".to_string(),
            batch_size: 200,
            poll_timeout: Duration::from_millis(1000),
            idle_wait: Duration::from_millis(1000),
            queue_capacity: 10_000,
            log_interval: Duration::from_secs(60),
        }
    }
}

/// Application-facing ends of the two queues.
///
/// The engine keeps the relay-facing ends, so collaborators can only read
/// what the inbound relay delivered and feed what the outbound relay
/// should publish.
pub struct EnginePorts {
    /// Records the inbound relay fetched from the broker
    pub inbound: mpsc::Receiver<Value>,
    /// Records handed here are published by the outbound relay
    pub outbound: mpsc::Sender<Value>,
}

/// Composition root for the two relay directions.
///
/// Owns the broker client handles and both bounded queues. [`RelayEngine::start`]
/// launches each relay as an independent task with its own shutdown signal;
/// the directions share no state and one failing leaves the other running.
pub struct RelayEngine<C, P> {
    consumer: Arc<C>,
    producer: Arc<P>,
    config: EngineConfig,
    inbound_tx: mpsc::Sender<Value>,
    outbound_rx: mpsc::Receiver<Value>,
}

impl<C, P> RelayEngine<C, P>
where
    C: BatchConsumer + 'static,
    P: AckProducer + 'static,
{
    /// Create the engine and both queues, returning the application-facing
    /// queue endpoints alongside it.
    #[must_use]
    pub fn new(consumer: Arc<C>, producer: Arc<P>, config: EngineConfig) -> (Self, EnginePorts) {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.queue_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);

        (
            Self {
                consumer,
                producer,
                config,
                inbound_tx,
                outbound_rx,
            },
            EnginePorts {
                inbound: inbound_rx,
                outbound: outbound_tx,
            },
        )
    }

    /// Launch both relays as background tasks and return their handle.
    /// Returns immediately; the relays run until stopped or failed.
    #[must_use]
    pub fn start(self) -> EngineHandle {
        info!(
            consume_topic = %self.config.consume_topic,
            produce_topic = %self.config.produce_topic,
            "Starting relay engine"
        );

        let inbound_cancel = CancellationToken::new();
        let outbound_cancel = CancellationToken::new();

        let inbound = InboundRelay::new(
            self.consumer,
            self.inbound_tx,
            self.config.consume_topic,
            self.config.batch_size,
            self.config.poll_timeout,
            self.config.log_interval,
        );
        let outbound = OutboundRelay::new(
            self.producer,
            self.outbound_rx,
            self.config.produce_topic,
            self.config.idle_wait,
            self.config.log_interval,
        );

        let inbound_task = spawn_relay(
            "inbound",
            inbound_cancel.clone(),
            inbound.run(inbound_cancel.clone()),
        );
        let outbound_task = spawn_relay(
            "outbound",
            outbound_cancel.clone(),
            outbound.run(outbound_cancel.clone()),
        );

        EngineHandle {
            inbound_cancel,
            outbound_cancel,
            inbound_task,
            outbound_task,
        }
    }
}

/// Run a relay future to completion, then mark its direction stopped so
/// [`EngineHandle::stopped`] observes error exits as well as signaled ones.
fn spawn_relay<F>(
    direction: &'static str,
    cancel: CancellationToken,
    relay: F,
) -> JoinHandle<Result<()>>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = relay.await;
        if let Err(ref e) = result {
            error!(direction, error = %e, "Relay terminated");
        }
        cancel.cancel();
        result
    })
}

/// Handle to a started engine: per-direction stop signals plus composite
/// shutdown.
pub struct EngineHandle {
    inbound_cancel: CancellationToken,
    outbound_cancel: CancellationToken,
    inbound_task: JoinHandle<Result<()>>,
    outbound_task: JoinHandle<Result<()>>,
}

impl EngineHandle {
    /// Signal the inbound relay to stop after its current cycle. Idempotent.
    pub fn stop_inbound(&self) {
        self.inbound_cancel.cancel();
    }

    /// Signal the outbound relay to stop after its current cycle. Idempotent.
    pub fn stop_outbound(&self) {
        self.outbound_cancel.cancel();
    }

    /// Completes once either relay has stopped, for any reason.
    pub async fn stopped(&self) {
        tokio::select! {
            () = self.inbound_cancel.cancelled() => {}
            () = self.outbound_cancel.cancelled() => {}
        }
    }

    /// Stop both relays and wait for them to finish. In-flight cycles
    /// complete first. When both directions failed, the inbound error wins.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down relay engine");
        self.inbound_cancel.cancel();
        self.outbound_cancel.cancel();

        let inbound = join_relay(self.inbound_task).await;
        let outbound = join_relay(self.outbound_task).await;
        inbound.and(outbound)
    }
}

async fn join_relay(task: JoinHandle<Result<()>>) -> Result<()> {
    match task.await {
        Ok(result) => result,
        Err(e) => Err(Error::Internal(format!("relay task failed to join: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InboundRecord, MockAckProducer, PartitionBatch, PartitionPosition};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves scripted poll results, then idles for the poll timeout like a
    /// broker with nothing to deliver. Records every commit it receives.
    struct ScriptedConsumer {
        batches: Mutex<VecDeque<Vec<PartitionBatch>>>,
        commits: Mutex<Vec<Vec<PartitionPosition>>>,
    }

    impl ScriptedConsumer {
        fn new(batches: Vec<Vec<PartitionBatch>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                commits: Mutex::new(Vec::new()),
            }
        }

        fn idle() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl BatchConsumer for ScriptedConsumer {
        async fn poll_batch(
            &self,
            _max_records: usize,
            timeout: Duration,
        ) -> Result<Vec<PartitionBatch>> {
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => Ok(batch),
                None => {
                    tokio::time::sleep(timeout).await;
                    Ok(vec![])
                }
            }
        }

        async fn commit(&self, positions: &[PartitionPosition]) -> Result<()> {
            self.commits.lock().unwrap().push(positions.to_vec());
            Ok(())
        }
    }

    /// Fails every poll, for exercising the error path.
    struct BrokenConsumer;

    #[async_trait]
    impl BatchConsumer for BrokenConsumer {
        async fn poll_batch(
            &self,
            _max_records: usize,
            _timeout: Duration,
        ) -> Result<Vec<PartitionBatch>> {
            Err(Error::Internal("poll failed".to_string()))
        }

        async fn commit(&self, _positions: &[PartitionPosition]) -> Result<()> {
            Ok(())
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            poll_timeout: Duration::from_millis(5),
            idle_wait: Duration::from_millis(5),
            queue_capacity: 16,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_both_relays() {
        let producer = MockAckProducer::new();

        let (engine, _ports) = RelayEngine::new(
            Arc::new(ScriptedConsumer::idle()),
            Arc::new(producer),
            fast_config(),
        );
        let handle = engine.start();

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_inbound_leaves_outbound_running() {
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = published.clone();
        let mut producer = MockAckProducer::new();
        producer.expect_publish().returning(move |_, payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        });

        let (engine, ports) = RelayEngine::new(
            Arc::new(ScriptedConsumer::idle()),
            Arc::new(producer),
            fast_config(),
        );
        let handle = engine.start();

        handle.stop_inbound();
        ports.outbound.send(json!({"still": "flowing"})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(*published.lock().unwrap(), vec![json!({"still": "flowing"})]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_observes_relay_failure() {
        let producer = MockAckProducer::new();

        let (engine, _ports) = RelayEngine::new(
            Arc::new(BrokenConsumer),
            Arc::new(producer),
            fast_config(),
        );
        let handle = engine.start();

        handle.stopped().await;
        let result = handle.shutdown().await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn test_ports_deliver_inbound_records() {
        let consumer = Arc::new(ScriptedConsumer::new(vec![vec![PartitionBatch {
            partition: 0,
            records: vec![InboundRecord {
                offset: 4,
                payload: json!("delivered"),
            }],
        }]]));
        let producer = MockAckProducer::new();

        let (engine, mut ports) =
            RelayEngine::new(consumer.clone(), Arc::new(producer), fast_config());
        let handle = engine.start();

        let delivered = ports.inbound.recv().await.unwrap();
        assert_eq!(delivered, json!("delivered"));

        handle.shutdown().await.unwrap();
        assert_eq!(
            *consumer.commits.lock().unwrap(),
            vec![vec![PartitionPosition {
                partition: 0,
                next_offset: 5,
            }]]
        );
    }
}
