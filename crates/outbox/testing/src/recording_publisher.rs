//! Broker publisher that records what it was sent.

use async_trait::async_trait;
use outbox_core::{headers, Acknowledgment, BrokerPublisher, OutgoingMessage, PublishError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Recording publisher with failure injection.
///
/// Acknowledged messages are kept in submission order. Failures can be
/// injected for a given record id (matched on the sequence header) or for
/// every message.
#[derive(Debug, Default, Clone)]
pub struct RecordingPublisher {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    messages: RwLock<Vec<OutgoingMessage>>,
    attempts: Mutex<HashMap<i64, u32>>,
    failures: Mutex<HashMap<i64, u32>>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every publish by `latency` before acknowledging.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.inner.latency.lock() = Some(latency);
        self
    }

    /// Reject the next `times` publishes of record `id`.
    pub fn fail_record(&self, id: i64, times: u32) {
        self.inner.failures.lock().insert(id, times);
    }

    /// Reject everything until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Acknowledged messages in submission order.
    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.inner.messages.read().clone()
    }

    pub fn message_count(&self) -> usize {
        self.inner.messages.read().len()
    }

    /// Sequence header of every acknowledged message, in submission order.
    pub fn sequences(&self) -> Vec<i64> {
        self.inner
            .messages
            .read()
            .iter()
            .filter_map(sequence_of)
            .collect()
    }

    /// Publish attempts for record `id`, acknowledged or not.
    pub fn attempts(&self, id: i64) -> u32 {
        self.inner.attempts.lock().get(&id).copied().unwrap_or(0)
    }

    fn take_failure(&self, id: Option<i64>) -> bool {
        let Some(id) = id else {
            return false;
        };
        let mut failures = self.inner.failures.lock();
        match failures.get_mut(&id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

fn sequence_of(message: &OutgoingMessage) -> Option<i64> {
    message
        .headers
        .get(headers::SEQUENCE)
        .and_then(|value| value.parse().ok())
}

#[async_trait]
impl BrokerPublisher for RecordingPublisher {
    async fn publish(&self, message: OutgoingMessage) -> Result<Acknowledgment, PublishError> {
        let id = sequence_of(&message);
        if let Some(id) = id {
            *self.inner.attempts.lock().entry(id).or_default() += 1;
        }

        let latency = *self.inner.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(PublishError::Connection("broker unavailable".to_string()));
        }
        if self.take_failure(id) {
            debug!(record_id = ?id, "Injected publish failure");
            return Err(PublishError::Rejected("injected failure".to_string()));
        }

        let mut messages = self.inner.messages.write();
        messages.push(message);
        Ok(Acknowledgment {
            stream: Some("memory".to_string()),
            sequence: Some(messages.len() as u64),
        })
    }
}
