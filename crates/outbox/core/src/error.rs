//! Error types for outbox operations.

use thiserror::Error;

/// Errors raised by the store, lock and write-path ports.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The write path was invoked without an active transaction.
    /// Nothing was appended.
    #[error("No active transaction: outbox records can only be appended inside a caller-owned transaction")]
    NoActiveTransaction,

    /// Query or update against the relational store failed.
    #[error("Store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The event payload or the header map could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OutboxError {
    /// Store failure without an underlying error value.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Store failure wrapping the backend error.
    pub fn store_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this is a store failure (fatal to the current relay cycle only).
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}

impl From<serde_json::Error> for OutboxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Broker rejected the message or did not acknowledge it in time.
///
/// Always recoverable: the record stays pending and is retried on the next cycle.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Broker rejected message: {0}")]
    Rejected(String),

    #[error("Broker acknowledgment timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Broker connection error: {0}")]
    Connection(String),
}

/// Errors surfaced by the relay itself.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Store error during relay cycle: {0}")]
    Store(#[from] OutboxError),

    #[error("Invalid relay configuration: {0}")]
    Config(String),

    #[error("Relay task failed: {0}")]
    Join(String),
}
