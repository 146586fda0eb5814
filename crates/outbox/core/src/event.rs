//! Event payloads accepted by the write path.
//!
//! The outbox stores payloads as opaque bytes; an [`OutboxEvent`] knows its
//! type name (sent as the `x-value-type` header) and how to encode itself.

use crate::error::OutboxError;
use serde::Serialize;
use std::borrow::Cow;

/// An event that can be recorded in the outbox.
pub trait OutboxEvent {
    /// Fully qualified type name identifying the payload schema.
    fn value_type(&self) -> Cow<'_, str>;

    /// Serialized payload.
    fn encode(&self) -> Result<Vec<u8>, OutboxError>;
}

/// JSON-encoded event.
#[derive(Debug, Clone)]
pub struct JsonEvent<'a, T: Serialize> {
    value_type: Cow<'a, str>,
    event: &'a T,
}

impl<'a, T: Serialize> JsonEvent<'a, T> {
    pub fn new(value_type: impl Into<Cow<'a, str>>, event: &'a T) -> Self {
        Self {
            value_type: value_type.into(),
            event,
        }
    }
}

impl<T: Serialize> OutboxEvent for JsonEvent<'_, T> {
    fn value_type(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.value_type)
    }

    fn encode(&self) -> Result<Vec<u8>, OutboxError> {
        Ok(serde_json::to_vec(self.event)?)
    }
}

/// Event whose payload was already encoded by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub value_type: String,
    pub bytes: Vec<u8>,
}

impl RawEvent {
    pub fn new(value_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            value_type: value_type.into(),
            bytes: bytes.into(),
        }
    }
}

impl OutboxEvent for RawEvent {
    fn value_type(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.value_type)
    }

    fn encode(&self) -> Result<Vec<u8>, OutboxError> {
        Ok(self.bytes.clone())
    }
}
