//! Ports for outbox infrastructure adapters.
//!
//! The relay and the writer only talk to these traits. Each port has a
//! PostgreSQL or NATS implementation in its backend crate and an in-memory
//! double in `outbox-testing`.

pub mod lock_store;
pub mod outbox_store;
pub mod publisher;

pub use lock_store::{LeaseHold, LockEntry, LockStore};
pub use outbox_store::{OutboxStore, OutboxTransaction};
pub use publisher::{Acknowledgment, BrokerPublisher, OutgoingMessage};
