//! # outbox-nats
//!
//! NATS JetStream implementation of the outbox [`BrokerPublisher`](outbox_core::BrokerPublisher).

pub mod publisher;

pub use publisher::{NatsError, NatsPublisher, NatsPublisherConfig, KEY_HEADER};
