//! # outbox-testing
//!
//! In-memory implementations of the outbox ports for tests.
//! Provides [`InMemoryOutboxStore`] (with [`InMemoryTransaction`]),
//! [`InMemoryLockStore`] and [`RecordingPublisher`].

pub mod memory_lock_store;
pub mod memory_outbox_store;
pub mod recording_publisher;

pub use memory_lock_store::InMemoryLockStore;
pub use memory_outbox_store::{InMemoryOutboxStore, InMemoryTransaction};
pub use recording_publisher::RecordingPublisher;
