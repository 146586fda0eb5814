//! # Outbox Core
//!
//! Transactional outbox: application code appends an event inside the same
//! database transaction as its business change, and a relay publishes the
//! pending events to the broker afterwards.
//!
//! Delivery is at-least-once. Records sharing a key are published in id
//! order. Instances relaying the same outbox coordinate through a leasable
//! named lock kept in the database; a lease that is not renewed in time can
//! be stolen by another instance.
//!
//! This crate holds the model, the ports and the relay state machine. The
//! PostgreSQL and NATS adapters live in `outbox-pg` and `outbox-nats`.

pub mod cleanup;
pub mod error;
pub mod event;
pub mod port;
pub mod record;
pub mod relay;
pub mod writer;

pub use cleanup::{
    start_outbox_cleanup_worker, OutboxCleanupConfig, OutboxCleanupMetrics, OutboxCleanupWorker,
};
pub use error::{OutboxError, PublishError, RelayError};
pub use event::{JsonEvent, OutboxEvent, RawEvent};
pub use port::{
    Acknowledgment, BrokerPublisher, LeaseHold, LockEntry, LockStore, OutboxStore,
    OutboxTransaction, OutgoingMessage,
};
pub use record::{headers, Header, Headers, NewOutboxRecord, OutboxRecord, TopicScope};
pub use relay::{
    CycleOutcome, OutboxRelay, OutboxRelayMetrics, ProcessResult, RelayConfig,
    RelayMetricsSnapshot, RelayState, RunningRelay,
};
pub use writer::OutboxWriter;
