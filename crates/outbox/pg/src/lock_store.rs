//! # PostgresLockStore
//!
//! Lease lock on the `outbox_lock` table.
//!
//! Acquire, renew and steal are one `INSERT ... ON CONFLICT DO UPDATE ...
//! WHERE` statement, so check and write cannot interleave with another
//! instance. Lease age is measured against the database clock (`NOW()`),
//! never the relay's own clock.
//!
//! A hold is a transaction holding `SELECT ... FOR UPDATE` on the lock row.
//! A competing upsert blocks on that row lock and re-evaluates its condition
//! against the committed row once the hold ends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_core::{LeaseHold, LockEntry, LockStore, OutboxError};
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;
use tracing::debug;

/// PostgreSQL implementation of LockStore.
#[derive(Debug, Clone)]
pub struct PostgresLockStore {
    pool: Pool<Postgres>,
}

impl PostgresLockStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_lock (
                name VARCHAR(255) PRIMARY KEY,
                owner VARCHAR(255),
                acquired_or_renewed_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LockStore for PostgresLockStore {
    async fn acquire_or_steal(
        &self,
        name: &str,
        owner: &str,
        lease_timeout: Duration,
    ) -> Result<bool, OutboxError> {
        let result = sqlx::query(
            r#"
            INSERT INTO outbox_lock (name, owner, acquired_or_renewed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE
            SET owner = EXCLUDED.owner,
                acquired_or_renewed_at = EXCLUDED.acquired_or_renewed_at
            WHERE outbox_lock.owner = EXCLUDED.owner
               OR outbox_lock.owner IS NULL
               OR outbox_lock.acquired_or_renewed_at < NOW() - make_interval(secs => $3)
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(lease_timeout.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxError::store_with_source("failed to acquire outbox lock", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, name: &str, owner: &str) -> Result<(), OutboxError> {
        let result = sqlx::query("UPDATE outbox_lock SET owner = NULL WHERE name = $1 AND owner = $2")
            .bind(name)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| OutboxError::store_with_source("failed to release outbox lock", e))?;

        if result.rows_affected() == 0 {
            debug!(lock = %name, owner = %owner, "Lock not owned at release, nothing to do");
        }

        Ok(())
    }

    async fn hold(
        &self,
        name: &str,
        owner: &str,
    ) -> Result<Option<Box<dyn LeaseHold>>, OutboxError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| OutboxError::store_with_source("failed to begin lock hold", e))?;

        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM outbox_lock WHERE name = $1 AND owner = $2 FOR UPDATE")
                .bind(name)
                .bind(owner)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| OutboxError::store_with_source("failed to lock outbox lock row", e))?;

        if row.is_none() {
            tx.rollback()
                .await
                .map_err(|e| OutboxError::store_with_source("failed to end lock hold", e))?;
            return Ok(None);
        }

        Ok(Some(Box::new(PgLeaseHold { tx })))
    }

    async fn current(&self, name: &str) -> Result<Option<LockEntry>, OutboxError> {
        let row = sqlx::query_as::<_, LockRow>(
            "SELECT name, owner, acquired_or_renewed_at FROM outbox_lock WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| OutboxError::store_with_source("failed to read outbox lock", e))?;

        Ok(row.map(Into::into))
    }
}

/// Row lock on the lease entry, released when the transaction ends.
struct PgLeaseHold {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LeaseHold for PgLeaseHold {
    async fn finish(self: Box<Self>) -> Result<(), OutboxError> {
        self.tx
            .commit()
            .await
            .map_err(|e| OutboxError::store_with_source("failed to end lock hold", e))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LockRow {
    name: String,
    owner: Option<String>,
    acquired_or_renewed_at: DateTime<Utc>,
}

impl From<LockRow> for LockEntry {
    fn from(row: LockRow) -> Self {
        LockEntry {
            name: row.name,
            owner: row.owner,
            acquired_or_renewed_at: row.acquired_or_renewed_at,
        }
    }
}
