//! # Relay
//!
//! Background processing that moves pending outbox records to the broker.
//! - [`OutboxRelay`]: lease-coordinated polling processor
//! - [`RunningRelay`]: handle used to observe and stop a spawned relay

pub mod config;
pub mod metrics;
pub mod outbox_relay;

pub use config::RelayConfig;
pub use metrics::{OutboxRelayMetrics, RelayMetricsSnapshot};
pub use outbox_relay::{CycleOutcome, OutboxRelay, ProcessResult, RelayState, RunningRelay};
