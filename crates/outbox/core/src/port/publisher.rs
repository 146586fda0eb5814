//! Broker publisher port.

use crate::error::PublishError;
use crate::record::{Headers, OutboxRecord};
use async_trait::async_trait;

/// Message handed to the broker for one outbox record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub topic: String,
    /// Ordering key. The broker keeps submission order for messages sharing it.
    pub key: String,
    pub value: Vec<u8>,
    pub headers: Headers,
}

impl OutgoingMessage {
    /// Build the broker message for `record`, adding the sequence and source headers.
    pub fn from_record(record: &OutboxRecord, source: &str) -> Self {
        Self {
            topic: record.topic.clone(),
            key: record.key.clone(),
            value: record.value.clone(),
            headers: record.outgoing_headers(source),
        }
    }
}

/// Durable acknowledgment returned by the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acknowledgment {
    pub stream: Option<String>,
    pub sequence: Option<u64>,
}

/// Publishes messages to the broker.
///
/// `publish` resolves only after the broker durably acknowledged the message
/// or definitively failed. Callers submit one message at a time and wait, so
/// per-key order equals submission order.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    async fn publish(&self, message: OutgoingMessage) -> Result<Acknowledgment, PublishError>;
}
