//! Configuration DTOs
//!
//! Immutable values built once by the [`ConfigLoader`](super::ConfigLoader)
//! and converted into the library configuration types at startup.

use outbox_core::{OutboxCleanupConfig, RelayConfig, TopicScope};
use outbox_nats::NatsPublisherConfig;
use std::time::Duration;

/// Complete relay process configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RelayServerConfig {
    pub database: DatabaseConfig,
    pub nats: NatsConfig,
    pub relay: RelaySettings,
    pub cleanup: CleanupSettings,
}

/// Outbox database connection
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    /// One connection is pinned by the lease hold for the length of a batch.
    pub pool_size: u32,
}

/// JetStream target
#[derive(Debug, Clone, PartialEq)]
pub struct NatsConfig {
    pub url: String,
    pub subject_prefix: String,
    pub stream: String,
    pub ack_timeout_ms: u64,
}

/// Relay loop tuning
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    pub lock_name: String,
    pub instance_id: String,
    pub event_source: Option<String>,
    pub poll_interval_ms: u64,
    pub lease_timeout_ms: u64,
    pub batch_size: usize,
    /// Empty means every topic.
    pub topics: Vec<String>,
}

/// Processed-record pruning
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    pub retention_secs: u64,
}

impl RelayServerConfig {
    pub fn relay_config(&self) -> RelayConfig {
        let relay = &self.relay;
        let scope = if relay.topics.is_empty() {
            TopicScope::All
        } else {
            TopicScope::only(relay.topics.iter().cloned())
        };

        let config = RelayConfig::new()
            .with_lock_name(relay.lock_name.clone())
            .with_instance_id(relay.instance_id.clone())
            .with_poll_interval(Duration::from_millis(relay.poll_interval_ms))
            .with_lease_timeout(Duration::from_millis(relay.lease_timeout_ms))
            .with_batch_size(relay.batch_size)
            .with_topic_scope(scope);

        match &relay.event_source {
            Some(source) => config.with_event_source(source.clone()),
            None => config,
        }
    }

    pub fn nats_publisher_config(&self) -> NatsPublisherConfig {
        NatsPublisherConfig {
            nats_url: self.nats.url.clone(),
            subject_prefix: self.nats.subject_prefix.clone(),
            stream_name: self.nats.stream.clone(),
            ack_timeout: Duration::from_millis(self.nats.ack_timeout_ms),
        }
    }

    pub fn cleanup_config(&self) -> OutboxCleanupConfig {
        let config = OutboxCleanupConfig::new()
            .with_interval(Duration::from_secs(self.cleanup.interval_secs))
            .with_retention(Duration::from_secs(self.cleanup.retention_secs));

        if self.cleanup.enabled {
            config.enabled()
        } else {
            config
        }
    }
}
