//! Relay process configuration.
//!
//! Everything is read once at startup from environment variables, optionally
//! preloaded from a `.env` file, validated, and then handed to the relay,
//! the NATS publisher and the cleanup worker as plain values.
//!
//! # Required Variables
//!
//! - `OUTBOX_DATABASE_URL`: PostgreSQL connection string
//! - `OUTBOX_NATS_URL`: NATS connection URL
//!
//! # Optional Variables
//!
//! - `OUTBOX_DB_POOL_SIZE` (default 5, at least 2)
//! - `OUTBOX_NATS_SUBJECT_PREFIX` (default `outbox`)
//! - `OUTBOX_NATS_STREAM` (default `OUTBOX`)
//! - `OUTBOX_NATS_ACK_TIMEOUT_MS` (default 5000)
//! - `OUTBOX_LOCK_NAME` (default `outbox-relay`)
//! - `OUTBOX_INSTANCE_ID` (default `relay-<uuid>`)
//! - `OUTBOX_EVENT_SOURCE` (default: the instance id)
//! - `OUTBOX_POLL_INTERVAL_MS` (default 500)
//! - `OUTBOX_LEASE_TIMEOUT_MS` (default 5000)
//! - `OUTBOX_BATCH_SIZE` (default 100)
//! - `OUTBOX_TOPICS`: comma separated topic list, unset relays every topic
//! - `OUTBOX_CLEANUP_ENABLED` (default false)
//! - `OUTBOX_CLEANUP_INTERVAL_SECS` (default 3600)
//! - `OUTBOX_CLEANUP_RETENTION_SECS` (default 604800)

pub mod dto;
pub mod error;
pub mod loader;
pub mod validator;

pub use dto::RelayServerConfig;
pub use loader::ConfigLoader;
