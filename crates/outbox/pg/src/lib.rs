//! # outbox-pg
//!
//! PostgreSQL adapters for the outbox ports:
//! - [`PostgresOutboxStore`]: relay-side reads, marking and pruning
//! - [`PostgresLockStore`]: the lease lock, one atomic upsert per acquire
//! - [`PgTransactionRef`] and [`PgTransactionScope`]: the write path
//!
//! A relay keeps one pooled connection busy for the lease hold while it marks
//! records on another, so pools need at least two connections.

pub mod lock_store;
pub mod outbox_store;
pub mod transaction;

pub use lock_store::PostgresLockStore;
pub use outbox_store::PostgresOutboxStore;
pub use transaction::{PgTransactionRef, PgTransactionScope};

use sqlx::{Pool, Postgres};

/// Create the outbox and lock tables if they do not exist.
pub async fn migrate(pool: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    PostgresOutboxStore::new(pool.clone()).migrate().await?;
    PostgresLockStore::new(pool.clone()).migrate().await?;
    Ok(())
}
