//! Relay configuration.

use crate::error::RelayError;
use crate::record::TopicScope;
use std::time::Duration;

/// Configuration for one relay instance.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Instances sharing a lock name compete for the same lease.
    pub lock_name: String,
    /// Owner identity written to the lock entry. Must be unique per instance.
    pub instance_id: String,
    /// Value of the source header. Falls back to `instance_id`.
    pub event_source: Option<String>,
    /// Pause between cycles. Zero means tight polling.
    pub poll_interval: Duration,
    /// Age after which another instance may steal the lease.
    pub lease_timeout: Duration,
    /// Maximum records published per cycle.
    pub batch_size: usize,
    pub topic_scope: TopicScope,
    /// Consecutive store failures after which every failure is logged as an error.
    pub error_report_threshold: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            lock_name: "outbox-relay".to_string(),
            instance_id: format!("relay-{}", uuid::Uuid::new_v4()),
            event_source: None,
            poll_interval: Duration::from_millis(500),
            lease_timeout: Duration::from_secs(5),
            batch_size: 100,
            topic_scope: TopicScope::All,
            error_report_threshold: 5,
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_name(mut self, lock_name: impl Into<String>) -> Self {
        self.lock_name = lock_name.into();
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn with_event_source(mut self, event_source: impl Into<String>) -> Self {
        self.event_source = Some(event_source.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_topic_scope(mut self, scope: TopicScope) -> Self {
        self.topic_scope = scope;
        self
    }

    pub fn with_error_report_threshold(mut self, threshold: u32) -> Self {
        self.error_report_threshold = threshold;
        self
    }

    /// Identity sent in the source header.
    pub fn source(&self) -> &str {
        self.event_source.as_deref().unwrap_or(&self.instance_id)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.lock_name.trim().is_empty() {
            return Err(RelayError::Config("lock_name must not be empty".to_string()));
        }
        if self.instance_id.trim().is_empty() {
            return Err(RelayError::Config("instance_id must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(RelayError::Config("batch_size must be greater than 0".to_string()));
        }
        if self.lease_timeout.is_zero() {
            return Err(RelayError::Config(
                "lease_timeout must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval >= self.lease_timeout {
            return Err(RelayError::Config(format!(
                "poll_interval ({:?}) must be shorter than lease_timeout ({:?}) or an idle owner loses its lease between cycles",
                self.poll_interval, self.lease_timeout
            )));
        }
        if let TopicScope::Only(topics) = &self.topic_scope {
            if topics.is_empty() {
                return Err(RelayError::Config(
                    "topic scope must list at least one topic".to_string(),
                ));
            }
        }
        Ok(())
    }
}
