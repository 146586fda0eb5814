//! JetStream publisher.
//!
//! Every outbox record becomes one JetStream message on
//! `<subject_prefix>.<topic>`. The publish only counts once the stream
//! returned its `PublishAck`, which means the message is stored durably.
//! JetStream keeps submission order within a stream, and the relay submits
//! one record at a time, so records sharing a key arrive in id order.

use async_nats::jetstream::{
    self,
    stream::{Config as StreamConfig, StorageType},
};
use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use outbox_core::{Acknowledgment, BrokerPublisher, OutgoingMessage, PublishError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Header carrying the record key.
pub const KEY_HEADER: &str = "x-key";

/// Configuration for [`NatsPublisher`].
#[derive(Debug, Clone)]
pub struct NatsPublisherConfig {
    /// NATS connection URL
    pub nats_url: String,
    /// Prepended to the topic to form the subject. Empty means the topic is the subject.
    pub subject_prefix: String,
    /// Stream created by [`NatsPublisher::ensure_stream`].
    pub stream_name: String,
    /// How long to wait for the JetStream acknowledgment.
    pub ack_timeout: Duration,
}

impl Default for NatsPublisherConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            subject_prefix: "outbox".to_string(),
            stream_name: "OUTBOX".to_string(),
            ack_timeout: Duration::from_secs(5),
        }
    }
}

impl NatsPublisherConfig {
    /// Subject a record for `topic` is published on.
    pub fn subject_for(&self, topic: &str) -> String {
        if self.subject_prefix.is_empty() {
            topic.to_string()
        } else {
            format!("{}.{}", self.subject_prefix, topic)
        }
    }

    /// Subject filter covering every topic.
    pub fn stream_subjects(&self) -> Result<Vec<String>, NatsError> {
        if self.subject_prefix.is_empty() {
            return Err(NatsError::Stream(
                "a subject prefix is required to create the outbox stream".to_string(),
            ));
        }
        Ok(vec![format!("{}.>", self.subject_prefix)])
    }
}

/// Connection and stream setup errors.
#[derive(Debug, Error)]
pub enum NatsError {
    #[error("Failed to connect to NATS: {0}")]
    Connect(String),

    #[error("JetStream stream error: {0}")]
    Stream(String),
}

/// JetStream-backed broker publisher.
#[derive(Debug, Clone)]
pub struct NatsPublisher {
    jetstream: jetstream::Context,
    config: NatsPublisherConfig,
}

impl NatsPublisher {
    /// Connect to the configured server.
    pub async fn connect(config: NatsPublisherConfig) -> Result<Self, NatsError> {
        let client = async_nats::connect(&config.nats_url)
            .await
            .map_err(|e| NatsError::Connect(e.to_string()))?;

        info!(url = %config.nats_url, "Connected to NATS");
        Ok(Self::from_client(client, config))
    }

    /// Create from existing client.
    pub fn from_client(client: Client, config: NatsPublisherConfig) -> Self {
        Self {
            jetstream: jetstream::new(client),
            config,
        }
    }

    pub fn config(&self) -> &NatsPublisherConfig {
        &self.config
    }

    /// Ensure the outbox stream exists, creating it if necessary.
    ///
    /// Returns `Ok(true)` if the stream was created, `Ok(false)` if it already existed.
    pub async fn ensure_stream(&self) -> Result<bool, NatsError> {
        let name = &self.config.stream_name;

        if self.jetstream.get_stream(name).await.is_ok() {
            info!(stream = %name, "Stream already exists");
            return Ok(false);
        }

        let stream_config = StreamConfig {
            name: name.clone(),
            subjects: self.config.stream_subjects()?,
            description: Some("Transactional outbox relay".to_string()),
            storage: StorageType::File,
            ..Default::default()
        };

        info!(stream = %name, subjects = ?stream_config.subjects, "Creating stream");
        self.jetstream
            .create_stream(stream_config)
            .await
            .map_err(|e| NatsError::Stream(e.to_string()))?;

        Ok(true)
    }
}

/// NATS header map for `message`: all record headers plus the key header.
fn header_map(message: &OutgoingMessage) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &message.headers {
        headers.insert(name.as_str(), value.as_str());
    }
    headers.insert(KEY_HEADER, message.key.as_str());
    headers
}

#[async_trait]
impl BrokerPublisher for NatsPublisher {
    async fn publish(&self, message: OutgoingMessage) -> Result<Acknowledgment, PublishError> {
        let subject = self.config.subject_for(&message.topic);
        let headers = header_map(&message);

        let ack = tokio::time::timeout(self.config.ack_timeout, async {
            let pending = self
                .jetstream
                .publish_with_headers(subject.clone(), headers, message.value.into())
                .await
                .map_err(|e| PublishError::Connection(e.to_string()))?;

            pending
                .await
                .map_err(|e| PublishError::Rejected(e.to_string()))
        })
        .await
        .map_err(|_| PublishError::Timeout(self.config.ack_timeout))??;

        debug!(
            subject = %subject,
            stream = %ack.stream,
            stream_sequence = ack.sequence,
            duplicate = ack.duplicate,
            "JetStream acknowledged message"
        );

        Ok(Acknowledgment {
            stream: Some(ack.stream),
            sequence: Some(ack.sequence),
        })
    }
}
