//! Outbox Record Model
//!
//! The durable unit of work relayed to the broker, plus the header
//! conventions every relayed message carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header map of a record. Ordered so that storage and broker output are deterministic.
pub type Headers = BTreeMap<String, String>;

/// Reserved header names.
pub mod headers {
    /// Fully qualified type name of the payload.
    pub const VALUE_TYPE: &str = "x-value-type";
    /// Record id, decimal. Consumers use it for dedup and ordering checks.
    pub const SEQUENCE: &str = "x-sequence";
    /// Identity of the relay that published the message.
    pub const SOURCE: &str = "x-source";
}

/// A persisted outbox record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Store-assigned, monotonically increasing id. Defines the relay order.
    pub id: i64,
    /// Destination topic.
    pub topic: String,
    /// Partitioning/ordering key.
    pub key: String,
    /// Opaque serialized payload.
    pub value: Vec<u8>,
    pub headers: Headers,
    pub created: DateTime<Utc>,
    /// `None` while the record is pending relay.
    pub processed: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    /// Check if the record has been relayed and acknowledged
    pub fn is_processed(&self) -> bool {
        self.processed.is_some()
    }

    /// Headers to send with this record: the stored headers plus sequence and source.
    pub fn outgoing_headers(&self, source: &str) -> Headers {
        let mut headers = self.headers.clone();
        headers.insert(headers::SEQUENCE.to_string(), self.id.to_string());
        headers.insert(headers::SOURCE.to_string(), source.to_string());
        headers
    }
}

/// A record as handed to the store by the write path.
///
/// `id` and `created` are assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxRecord {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
    pub headers: Headers,
}

impl NewOutboxRecord {
    pub fn new(topic: impl Into<String>, key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            value,
            headers: Headers::new(),
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Materialize the record with store-assigned id and creation time.
    pub fn into_record(self, id: i64, created: DateTime<Utc>) -> OutboxRecord {
        OutboxRecord {
            id,
            topic: self.topic,
            key: self.key,
            value: self.value,
            headers: self.headers,
            created,
            processed: None,
        }
    }
}

/// Caller-supplied header for the write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Which topics a relay (or a count query) covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopicScope {
    /// Every topic in the outbox.
    #[default]
    All,
    /// Only the listed topics.
    Only(Vec<String>),
}

impl TopicScope {
    pub fn only<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(topics.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, topic: &str) -> bool {
        match self {
            TopicScope::All => true,
            TopicScope::Only(topics) => topics.iter().any(|t| t == topic),
        }
    }

    /// Topic list for backends that filter with an array parameter; `None` means no filter.
    pub fn as_slice(&self) -> Option<&[String]> {
        match self {
            TopicScope::All => None,
            TopicScope::Only(topics) => Some(topics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> OutboxRecord {
        let mut headers = Headers::new();
        headers.insert(headers::VALUE_TYPE.to_string(), "demo.OrderPlaced".to_string());
        headers.insert("trace_id".to_string(), "abc123".to_string());

        NewOutboxRecord::new("orders", "order-1", b"payload".to_vec())
            .with_headers(headers)
            .into_record(42, Utc::now())
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = sample_record();
        assert_eq!(record.id, 42);
        assert!(!record.is_processed());
    }

    #[test]
    fn test_outgoing_headers_add_sequence_and_source() {
        let record = sample_record();
        let outgoing = record.outgoing_headers("relay-a");

        assert_eq!(outgoing.get(headers::SEQUENCE), Some(&"42".to_string()));
        assert_eq!(outgoing.get(headers::SOURCE), Some(&"relay-a".to_string()));
        assert_eq!(outgoing.get("trace_id"), Some(&"abc123".to_string()));
        assert_eq!(
            outgoing.get(headers::VALUE_TYPE),
            Some(&"demo.OrderPlaced".to_string())
        );
        // stored headers stay untouched
        assert!(!record.headers.contains_key(headers::SEQUENCE));
    }

    #[test]
    fn test_topic_scope() {
        assert!(TopicScope::All.contains("anything"));
        assert!(TopicScope::All.as_slice().is_none());

        let scope = TopicScope::only(["orders", "payments"]);
        assert!(scope.contains("orders"));
        assert!(!scope.contains("shipping"));
        assert_eq!(scope.as_slice().map(|s| s.len()), Some(2));
    }
}
