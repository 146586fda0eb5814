//! In-memory implementation of LockStore for testing.
//!
//! Each lock name maps to a row guarded by an async mutex, standing in for a
//! database row lock: `acquire_or_steal` locks the row for its single
//! compare-and-set, and `hold` keeps it locked until the hold is finished.
//! Lease age uses `tokio::time::Instant`, so tests can drive expiry with a
//! paused clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_core::{LeaseHold, LockEntry, LockStore, OutboxError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use tokio::time::Instant;

type Row = Arc<RowMutex<Option<StoredEntry>>>;

#[derive(Debug, Clone)]
struct StoredEntry {
    owner: Option<String>,
    renewed: Instant,
    renewed_at: DateTime<Utc>,
}

impl StoredEntry {
    fn claimable_by(&self, owner: &str, lease_timeout: Duration) -> bool {
        match self.owner.as_deref() {
            None => true,
            Some(current) if current == owner => true,
            Some(_) => self.renewed.elapsed() > lease_timeout,
        }
    }
}

/// In-memory lock store implementation.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLockStore {
    inner: Arc<InnerStore>,
}

#[derive(Debug, Default)]
struct InnerStore {
    rows: Mutex<HashMap<String, Row>>,
}

impl InMemoryLockStore {
    /// Create a new in-memory lock store.
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, name: &str) -> Row {
        self.inner
            .rows
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn acquire_or_steal(
        &self,
        name: &str,
        owner: &str,
        lease_timeout: Duration,
    ) -> Result<bool, OutboxError> {
        let row = self.row(name);
        let mut entry = row.lock().await;

        let acquired = entry
            .as_ref()
            .map_or(true, |current| current.claimable_by(owner, lease_timeout));

        if acquired {
            *entry = Some(StoredEntry {
                owner: Some(owner.to_string()),
                renewed: Instant::now(),
                renewed_at: Utc::now(),
            });
        }

        Ok(acquired)
    }

    async fn release(&self, name: &str, owner: &str) -> Result<(), OutboxError> {
        let row = self.row(name);
        let mut entry = row.lock().await;

        if let Some(current) = entry.as_mut() {
            if current.owner.as_deref() == Some(owner) {
                current.owner = None;
            }
        }

        Ok(())
    }

    async fn hold(
        &self,
        name: &str,
        owner: &str,
    ) -> Result<Option<Box<dyn LeaseHold>>, OutboxError> {
        let guard = self.row(name).lock_owned().await;

        let owned = guard
            .as_ref()
            .is_some_and(|current| current.owner.as_deref() == Some(owner));

        if owned {
            Ok(Some(Box::new(InMemoryLeaseHold { _guard: guard })))
        } else {
            Ok(None)
        }
    }

    async fn current(&self, name: &str) -> Result<Option<LockEntry>, OutboxError> {
        let row = self.row(name);
        let entry = row.lock().await;

        Ok(entry.as_ref().map(|current| LockEntry {
            name: name.to_string(),
            owner: current.owner.clone(),
            acquired_or_renewed_at: current.renewed_at,
        }))
    }
}

struct InMemoryLeaseHold {
    _guard: OwnedMutexGuard<Option<StoredEntry>>,
}

#[async_trait]
impl LeaseHold for InMemoryLeaseHold {
    async fn finish(self: Box<Self>) -> Result<(), OutboxError> {
        Ok(())
    }
}
