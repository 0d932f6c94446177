//! Consumer configuration structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Kafka consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,

    /// Consumer group ID
    pub group_id: String,

    /// Topics to consume from
    pub topics: Vec<String>,

    /// Upper bound for a single poll call; cancellation is observed
    /// within one such window
    pub poll_timeout: Duration,

    /// Session timeout in milliseconds
    pub session_timeout_ms: u32,

    /// Offset reset policy (earliest, latest, none)
    pub auto_offset_reset: String,

    /// Delegate offset commits to the broker client instead of the
    /// per-record commit path
    pub enable_auto_commit: bool,

    /// Additional Kafka properties
    pub kafka_properties: HashMap<String, String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "kafka-utility".to_string(),
            topics: vec!["events".to_string()],
            poll_timeout: Duration::from_millis(500),
            session_timeout_ms: 30000,
            auto_offset_reset: "earliest".to_string(),
            enable_auto_commit: false,
            kafka_properties: HashMap::new(),
        }
    }
}

/// Builder for [`ConsumerConfig`]
pub struct ConsumerConfigBuilder {
    config: ConsumerConfig,
}

impl ConsumerConfigBuilder {
    /// Create a new consumer config builder
    pub fn new() -> Self {
        Self {
            config: ConsumerConfig::default(),
        }
    }

    /// Set the broker addresses
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.config.brokers = brokers.into();
        self
    }

    /// Set the consumer group ID
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.config.group_id = group_id.into();
        self
    }

    /// Set the topics to consume
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.config.topics = topics;
        self
    }

    /// Subscribe to a single topic
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.config.topics = vec![topic.into()];
        self
    }

    /// Set the poll timeout
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    pub fn session_timeout_ms(mut self, timeout: u32) -> Self {
        self.config.session_timeout_ms = timeout;
        self
    }

    /// Set the offset reset policy
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.config.auto_offset_reset = policy.into();
        self
    }

    pub fn enable_auto_commit(mut self, enable: bool) -> Self {
        self.config.enable_auto_commit = enable;
        self
    }

    /// Add a custom Kafka property
    pub fn kafka_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.kafka_properties.insert(key.into(), value.into());
        self
    }

    /// Build the consumer configuration
    pub fn build(self) -> ConsumerConfig {
        self.config
    }
}

impl Default for ConsumerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerConfig {
    /// Create a new consumer config builder
    pub fn builder() -> ConsumerConfigBuilder {
        ConsumerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.brokers.is_empty() {
            return Err("brokers cannot be empty".to_string());
        }

        if self.group_id.is_empty() {
            return Err("group ID cannot be empty".to_string());
        }

        if self.topics.is_empty() || self.topics.iter().any(|t| t.is_empty()) {
            return Err("topics cannot be empty".to_string());
        }

        if self.poll_timeout.is_zero() {
            return Err("poll timeout must be greater than 0".to_string());
        }

        match self.auto_offset_reset.as_str() {
            "earliest" | "latest" | "none" => {}
            other => {
                return Err(format!(
                    "auto_offset_reset must be earliest, latest or none, got '{}'",
                    other
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_overrides_defaults() {
        let config = ConsumerConfig::builder()
            .brokers("broker-1:9092,broker-2:9092")
            .group_id("my-group")
            .topic("my-topic")
            .poll_timeout(Duration::from_millis(250))
            .auto_offset_reset("latest")
            .kafka_property("fetch.min.bytes", "1")
            .build();

        assert_eq!(config.brokers, "broker-1:9092,broker-2:9092");
        assert_eq!(config.group_id, "my-group");
        assert_eq!(config.topics, vec!["my-topic".to_string()]);
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
        assert_eq!(config.auto_offset_reset, "latest");
        assert_eq!(
            config.kafka_properties.get("fetch.min.bytes"),
            Some(&"1".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let mut config = ConsumerConfig::default();
        config.brokers = String::new();
        assert!(config.validate().is_err());

        let mut config = ConsumerConfig::default();
        config.topics = vec![];
        assert!(config.validate().is_err());

        let mut config = ConsumerConfig::default();
        config.poll_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_offset_reset() {
        let mut config = ConsumerConfig::default();
        config.auto_offset_reset = "sometimes".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("auto_offset_reset"));
    }
}
