use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

/// Broker connection and topic settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Broker addresses, joined into `bootstrap.servers`
    pub brokers: Vec<String>,
    /// Consumer group id for the inbound side
    pub group_id: String,
    /// Topic the inbound relay subscribes to
    pub consume_topic: String,
    /// Topic the outbound relay publishes to
    pub produce_topic: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            group_id: "kafka-relay".to_string(),
            consume_topic: "inbound".to_string(),
            produce_topic: "outbound".to_string(),
        }
    }
}

/// Relay loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum records fetched per inbound poll
    pub batch_size: usize,
    /// Inbound poll timeout in milliseconds
    pub poll_timeout_ms: u64,
    /// How long the outbound relay waits on an empty queue per cycle
    pub idle_wait_ms: u64,
    /// Capacity of each local queue
    pub queue_capacity: usize,
    /// Seconds between throughput log lines per direction
    pub log_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            poll_timeout_ms: 1000,
            idle_wait_ms: 1000,
            queue_capacity: 10_000,
            log_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl KafkaConfig {
    /// Broker list in the comma-separated form `bootstrap.servers` expects
    #[must_use]
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    ///
    /// Environment keys use a double-underscore separator below the
    /// `KAFKA_RELAY` prefix so snake_case field names stay addressable,
    /// e.g. `KAFKA_RELAY_KAFKA__GROUP_ID` or `KAFKA_RELAY_RELAY__BATCH_SIZE`.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Load config file if provided
        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("KAFKA_RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the configuration for values the relays cannot run with.
    /// Returns all problems found rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.kafka.brokers.is_empty() || self.kafka.brokers.iter().any(String::is_empty) {
            errors.push("kafka.brokers must contain at least one non-empty address".to_string());
        }
        if self.kafka.group_id.is_empty() {
            errors.push("kafka.group_id must not be empty".to_string());
        }
        if self.kafka.consume_topic.is_empty() {
            errors.push("kafka.consume_topic must not be empty".to_string());
        }
        if self.kafka.produce_topic.is_empty() {
            errors.push("kafka.produce_topic must not be empty".to_string());
        }
        if self.relay.batch_size == 0 {
            errors.push("relay.batch_size must be at least 1".to_string());
        }
        if self.relay.queue_capacity == 0 {
            errors.push("relay.queue_capacity must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.kafka.bootstrap_servers(), "localhost:9092");
        assert_eq!(config.kafka.group_id, "kafka-relay");
        assert_eq!(config.relay.batch_size, 200);
        assert_eq!(config.relay.poll_timeout_ms, 1000);
        assert_eq!(config.relay.idle_wait_ms, 1000);
        assert_eq!(config.relay.queue_capacity, 10_000);
        assert_eq!(config.relay.log_interval_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bootstrap_servers_joins_brokers() {
        let config = KafkaConfig {
            brokers: vec!["kafka-1:9092".to_string(), "kafka-2:9092".to_string()],
            ..KafkaConfig::default()
        };

        assert_eq!(config.bootstrap_servers(), "kafka-1:9092,kafka-2:9092");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.kafka.consume_topic = String::new();
        config.relay.batch_size = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("consume_topic"));
        assert!(errors[1].contains("batch_size"));
    }

    #[test]
    fn test_load_from_file_keeps_defaults_for_missing_keys() {
        let file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        std::fs::write(
            file.path(),
            r#"
[kafka]
brokers = ["kafka-1:9092", "kafka-2:9092"]
group_id = "mirror"

[relay]
batch_size = 500
"#,
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.kafka.group_id, "mirror");
        assert_eq!(config.kafka.bootstrap_servers(), "kafka-1:9092,kafka-2:9092");
        assert_eq!(config.relay.batch_size, 500);
        // Keys absent from the file fall back to defaults
        assert_eq!(config.relay.poll_timeout_ms, 1000);
        assert_eq!(config.kafka.consume_topic, "inbound");
    }

    #[test]
    fn test_env_overrides_apply() {
        // Prefix joins with one underscore, sections nest with two
        std::env::set_var("KAFKA_RELAY_KAFKA__PRODUCE_TOPIC", "env-egress");
        std::env::set_var("KAFKA_RELAY_RELAY__QUEUE_CAPACITY", "123");

        let config = Config::from_env().unwrap();

        std::env::remove_var("KAFKA_RELAY_KAFKA__PRODUCE_TOPIC");
        std::env::remove_var("KAFKA_RELAY_RELAY__QUEUE_CAPACITY");

        assert_eq!(config.kafka.produce_topic, "env-egress");
        assert_eq!(config.relay.queue_capacity, 123);
    }
}
