//! # Outbox Store Port
//!
//! Read and housekeeping access to the outbox table ([`OutboxStore`]) and the
//! append-only write path that runs inside a caller-owned transaction
//! ([`OutboxTransaction`]).
//!
//! Appending is deliberately not part of [`OutboxStore`]: a record may only be
//! created through a transaction the caller opened for its business change,
//! so that the record commits or rolls back together with it.

use crate::error::OutboxError;
use crate::record::{NewOutboxRecord, OutboxRecord, TopicScope};
use async_trait::async_trait;
use std::time::Duration;

/// Store operations used by the relay and by housekeeping.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Pending records (`processed IS NULL`) in ascending id order, at most `limit`.
    ///
    /// Every call re-queries current state; no cursor is kept between calls.
    async fn fetch_unprocessed(
        &self,
        limit: usize,
        scope: &TopicScope,
    ) -> Result<Vec<OutboxRecord>, OutboxError>;

    /// Set `processed` to now if it is still unset.
    ///
    /// Returns `true` when this call set the timestamp and `false` when it was
    /// already set or the record does not exist. Runs as its own atomic unit.
    async fn mark_processed(&self, id: i64) -> Result<bool, OutboxError>;

    /// Look up a single record.
    async fn find(&self, id: i64) -> Result<Option<OutboxRecord>, OutboxError>;

    /// Number of pending records in scope.
    async fn count_unprocessed(&self, scope: &TopicScope) -> Result<u64, OutboxError>;

    /// Delete processed records whose `processed` timestamp is older than `older_than`.
    async fn prune_processed(&self, older_than: Duration) -> Result<u64, OutboxError>;
}

/// A caller-owned transaction the write path appends into.
///
/// The write path never begins a transaction itself. Implementations that can
/// be absent or already finished report it through [`is_active`](Self::is_active).
#[async_trait]
pub trait OutboxTransaction: Send {
    /// Whether a transaction is currently open.
    fn is_active(&self) -> bool;

    /// Insert a pending record inside the transaction.
    ///
    /// Fails with [`OutboxError::NoActiveTransaction`] when no transaction is
    /// open; nothing is written in that case.
    async fn append(&mut self, record: NewOutboxRecord) -> Result<OutboxRecord, OutboxError>;
}
