//! # Lock Store Port
//!
//! A leasable named lock kept in the same relational store as the outbox.
//! Ownership is advisory: a lease whose last renewal is older than the lease
//! timeout can be stolen by any other owner without cooperation.

use crate::error::OutboxError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stored state of a named lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub name: String,
    /// `None` after the last owner released it.
    pub owner: Option<String>,
    pub acquired_or_renewed_at: DateTime<Utc>,
}

impl LockEntry {
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner.as_deref() == Some(owner)
    }
}

#[async_trait]
pub trait LockStore: Send + Sync {
    /// Acquire, renew or steal the lock in a single atomic step.
    ///
    /// Succeeds when no entry exists, the entry is unowned, `owner` already
    /// owns it, or the last renewal is older than `lease_timeout`. On success
    /// the owner is written and the renewal timestamp refreshed. On failure
    /// nothing changes.
    async fn acquire_or_steal(
        &self,
        name: &str,
        owner: &str,
        lease_timeout: Duration,
    ) -> Result<bool, OutboxError>;

    /// Clear ownership if `owner` still holds the lock. No-op otherwise.
    async fn release(&self, name: &str, owner: &str) -> Result<(), OutboxError>;

    /// Pin the lock entry for the length of one publishing batch.
    ///
    /// Returns `None` when `owner` no longer owns the lock. While the returned
    /// hold is alive, a competing [`acquire_or_steal`](Self::acquire_or_steal)
    /// on the same name waits, then evaluates its condition as usual.
    ///
    /// The hold must be finished before calling [`release`](Self::release)
    /// from the same task.
    async fn hold(&self, name: &str, owner: &str)
        -> Result<Option<Box<dyn LeaseHold>>, OutboxError>;

    /// Current entry for `name`, if one was ever created.
    async fn current(&self, name: &str) -> Result<Option<LockEntry>, OutboxError>;
}

/// An active pin on a lock entry. Dropping it without [`finish`](Self::finish)
/// also ends the hold.
#[async_trait]
pub trait LeaseHold: Send {
    async fn finish(self: Box<Self>) -> Result<(), OutboxError>;
}
