//! Write-path transactions.
//!
//! The outbox writer appends into the caller's transaction and never opens
//! one itself. A borrowed `sqlx::Transaction` ([`PgTransactionRef`]) is always
//! active. Code that passes its transaction around as "maybe there is one"
//! uses [`PgTransactionScope`], which reports an absent transaction so the
//! writer can refuse to append.

use crate::outbox_store::insert_record;
use async_trait::async_trait;
use outbox_core::{NewOutboxRecord, OutboxError, OutboxRecord, OutboxTransaction};
use sqlx::{Pool, Postgres, Transaction};

/// The caller's open transaction, borrowed for appending.
pub struct PgTransactionRef<'t, 'c> {
    tx: &'t mut Transaction<'c, Postgres>,
}

impl<'t, 'c> PgTransactionRef<'t, 'c> {
    pub fn new(tx: &'t mut Transaction<'c, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl<'t, 'c> OutboxTransaction for PgTransactionRef<'t, 'c> {
    fn is_active(&self) -> bool {
        true
    }

    async fn append(&mut self, record: NewOutboxRecord) -> Result<OutboxRecord, OutboxError> {
        insert_record(&mut **self.tx, record).await
    }
}

/// A transaction context that may or may not hold an open transaction.
#[derive(Default)]
pub struct PgTransactionScope {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTransactionScope {
    /// Scope without a transaction. Appending through it fails.
    pub fn none() -> Self {
        Self { tx: None }
    }

    pub async fn begin(pool: &Pool<Postgres>) -> Result<Self, OutboxError> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| OutboxError::store_with_source("failed to begin transaction", e))?;
        Ok(Self { tx: Some(tx) })
    }

    /// The open transaction, for the caller's own business statements.
    pub fn transaction(&mut self) -> Option<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut()
    }

    pub async fn commit(self) -> Result<(), OutboxError> {
        let tx = self.tx.ok_or(OutboxError::NoActiveTransaction)?;
        tx.commit()
            .await
            .map_err(|e| OutboxError::store_with_source("failed to commit transaction", e))
    }

    pub async fn rollback(self) -> Result<(), OutboxError> {
        match self.tx {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|e| OutboxError::store_with_source("failed to roll back transaction", e)),
            None => Ok(()),
        }
    }
}

impl From<Transaction<'static, Postgres>> for PgTransactionScope {
    fn from(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }
}

#[async_trait]
impl OutboxTransaction for PgTransactionScope {
    fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    async fn append(&mut self, record: NewOutboxRecord) -> Result<OutboxRecord, OutboxError> {
        match self.tx.as_mut() {
            Some(tx) => insert_record(&mut **tx, record).await,
            None => Err(OutboxError::NoActiveTransaction),
        }
    }
}
