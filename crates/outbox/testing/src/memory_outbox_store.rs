//! In-memory implementation of OutboxStore for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_core::{NewOutboxRecord, OutboxError, OutboxRecord, OutboxStore, OutboxTransaction, TopicScope};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory outbox store implementation.
///
/// Records only become visible once the [`InMemoryTransaction`] that appended
/// them is committed. Ids are handed out at append time, so a rolled back
/// transaction leaves a gap, like a database sequence does.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOutboxStore {
    inner: Arc<InnerStore>,
}

#[derive(Debug, Default)]
struct InnerStore {
    records: RwLock<BTreeMap<i64, OutboxRecord>>,
    last_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryOutboxStore {
    /// Create a new in-memory outbox store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction to append into.
    pub fn begin(&self) -> InMemoryTransaction {
        InMemoryTransaction {
            store: self.clone(),
            staged: Vec::new(),
            active: true,
        }
    }

    /// A transaction context with no transaction open.
    pub fn no_transaction(&self) -> InMemoryTransaction {
        InMemoryTransaction {
            store: self.clone(),
            staged: Vec::new(),
            active: false,
        }
    }

    /// Make every store call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Get the number of records stored, processed or not.
    pub fn record_count(&self) -> usize {
        self.inner.records.read().len()
    }

    pub fn records(&self) -> Vec<OutboxRecord> {
        self.inner.records.read().values().cloned().collect()
    }

    pub fn pending_ids(&self) -> Vec<i64> {
        self.inner
            .records
            .read()
            .values()
            .filter(|r| !r.is_processed())
            .map(|r| r.id)
            .collect()
    }

    /// Overwrite the processed timestamp, e.g. to age records for pruning.
    pub fn set_processed_at(&self, id: i64, processed: DateTime<Utc>) {
        if let Some(record) = self.inner.records.write().get_mut(&id) {
            record.processed = Some(processed);
        }
    }

    fn check_available(&self) -> Result<(), OutboxError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(OutboxError::store("in-memory store marked unavailable"));
        }
        Ok(())
    }

    fn next_id(&self) -> i64 {
        self.inner.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn fetch_unprocessed(
        &self,
        limit: usize,
        scope: &TopicScope,
    ) -> Result<Vec<OutboxRecord>, OutboxError> {
        self.check_available()?;
        let records = self.inner.records.read();
        Ok(records
            .values()
            .filter(|r| !r.is_processed() && scope.contains(&r.topic))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, id: i64) -> Result<bool, OutboxError> {
        self.check_available()?;
        let mut records = self.inner.records.write();
        match records.get_mut(&id) {
            Some(record) if record.processed.is_none() => {
                record.processed = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find(&self, id: i64) -> Result<Option<OutboxRecord>, OutboxError> {
        self.check_available()?;
        Ok(self.inner.records.read().get(&id).cloned())
    }

    async fn count_unprocessed(&self, scope: &TopicScope) -> Result<u64, OutboxError> {
        self.check_available()?;
        let records = self.inner.records.read();
        Ok(records
            .values()
            .filter(|r| !r.is_processed() && scope.contains(&r.topic))
            .count() as u64)
    }

    async fn prune_processed(&self, older_than: Duration) -> Result<u64, OutboxError> {
        self.check_available()?;
        let retention = chrono::Duration::from_std(older_than)
            .map_err(|e| OutboxError::store_with_source("retention out of range", e))?;
        let cutoff = Utc::now() - retention;

        let mut records = self.inner.records.write();
        let before = records.len();
        records.retain(|_, r| r.processed.map_or(true, |processed| processed >= cutoff));
        Ok((before - records.len()) as u64)
    }
}

/// Transaction over [`InMemoryOutboxStore`].
///
/// Dropping it without [`commit`](Self::commit) discards the staged records.
#[derive(Debug)]
pub struct InMemoryTransaction {
    store: InMemoryOutboxStore,
    staged: Vec<OutboxRecord>,
    active: bool,
}

impl InMemoryTransaction {
    /// Make the staged records visible.
    pub fn commit(mut self) {
        let mut records = self.store.inner.records.write();
        for record in self.staged.drain(..) {
            records.insert(record.id, record);
        }
    }

    pub fn rollback(self) {}

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }
}

#[async_trait]
impl OutboxTransaction for InMemoryTransaction {
    fn is_active(&self) -> bool {
        self.active
    }

    async fn append(&mut self, record: NewOutboxRecord) -> Result<OutboxRecord, OutboxError> {
        if !self.active {
            return Err(OutboxError::NoActiveTransaction);
        }
        self.store.check_available()?;

        let record = record.into_record(self.store.next_id(), Utc::now());
        self.staged.push(record.clone());
        Ok(record)
    }
}
