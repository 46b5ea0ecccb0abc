use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use kafka_relay_core::broker::{KafkaAckProducer, KafkaBatchConsumer};
use kafka_relay_core::relay::{EngineConfig, EnginePorts, RelayEngine};
use kafka_relay_core::{logging, Config};

/// Load configuration from config file and environment variables
///
/// Config file search order:
/// 1. KAFKA_RELAY_CONFIG_PATH environment variable (explicit path)
/// 2. ./config.toml (current working directory)
/// 3. /config/config.toml (Kubernetes mount path)
/// 4. Fall back to environment variables only
///
/// Environment variables override file values in every case.
fn load_config() -> Result<Config> {
    let config_path = std::env::var("KAFKA_RELAY_CONFIG_PATH")
        .ok()
        .filter(|p| std::path::Path::new(p).exists())
        .or_else(|| {
            let cwd = "config.toml";
            if std::path::Path::new(cwd).exists() {
                Some(cwd.to_string())
            } else {
                None
            }
        })
        .or_else(|| {
            let mounted = "/config/config.toml";
            if std::path::Path::new(mounted).exists() {
                Some(mounted.to_string())
            } else {
                None
            }
        });

    match &config_path {
        Some(path) => eprintln!("Loading config from {path}"),
        None => eprintln!("No config file found, using environment variables"),
    }
    let config = Config::load(config_path.as_deref())?;

    // Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Kafka relay starting...");
    info!("Brokers: {}", config.kafka.bootstrap_servers());
    info!(
        "Topics: {} -> local queues -> {}",
        config.kafka.consume_topic, config.kafka.produce_topic
    );

    // 3. Create broker clients
    let consumer = Arc::new(KafkaBatchConsumer::connect(&config.kafka)?);
    let producer = Arc::new(KafkaAckProducer::connect(&config.kafka)?);

    // 4. Build and start the relay engine
    let engine_config = EngineConfig {
        consume_topic: config.kafka.consume_topic.clone(),
        produce_topic: config.kafka.produce_topic.clone(),
        batch_size: config.relay.batch_size,
        poll_timeout: Duration::from_millis(config.relay.poll_timeout_ms),
        idle_wait: Duration::from_millis(config.relay.idle_wait_ms),
        queue_capacity: config.relay.queue_capacity,
        log_interval: Duration::from_secs(config.relay.log_interval_secs),
    };
    let (engine, ports) = RelayEngine::new(consumer, producer, engine_config);
    let handle = engine.start();

    // 5. Pump consumed records straight back out, making this process a
    //    topic-to-topic bridge. Applications embedding the engine replace
    //    this loop with their own processing.
    let EnginePorts { mut inbound, outbound } = ports;
    let pump = tokio::spawn(async move {
        while let Some(payload) = inbound.recv().await {
            if outbound.send(payload).await.is_err() {
                warn!("Outbound queue closed, pump stopping");
                break;
            }
        }
        info!("Pump stopped");
    });

    // 6. Run until a signal arrives or a relay dies
    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        () = handle.stopped() => {
            error!("A relay stopped unexpectedly, shutting down");
        }
    }

    // 7. Stop both relays, letting in-flight cycles finish
    let result = handle.shutdown().await;
    let _ = pump.await;
    result?;

    info!("Kafka relay stopped");
    Ok(())
}
