//! # PostgresOutboxStore
//!
//! PostgreSQL implementation of [`OutboxStore`].
//!
//! Records are read in `id` order; `id` comes from a `BIGSERIAL`, so it is
//! assigned once by the database at insert time. Pending records are found
//! through a partial index on `processed IS NULL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_core::{Headers, NewOutboxRecord, OutboxError, OutboxRecord, OutboxStore, TopicScope};
use sqlx::types::Json;
use sqlx::{PgConnection, Pool, Postgres};
use std::time::Duration;

const RECORD_COLUMNS: &str = "id, topic, key, value, headers, created, processed";

/// PostgreSQL implementation of OutboxStore.
#[derive(Debug, Clone)]
pub struct PostgresOutboxStore {
    pool: Pool<Postgres>,
}

impl PostgresOutboxStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_record (
                id BIGSERIAL PRIMARY KEY,
                topic VARCHAR(255) NOT NULL,
                key VARCHAR(255) NOT NULL,
                value BYTEA NOT NULL,
                headers JSONB NOT NULL DEFAULT '{}',
                created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                processed TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_outbox_record_pending ON outbox_record(id) WHERE processed IS NULL",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn fetch_unprocessed(
        &self,
        limit: usize,
        scope: &TopicScope,
    ) -> Result<Vec<OutboxRecord>, OutboxError> {
        let rows = sqlx::query_as::<_, OutboxRecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM outbox_record
            WHERE processed IS NULL
              AND ($2::TEXT[] IS NULL OR topic = ANY($2))
            ORDER BY id ASC
            LIMIT $1
            "#
        ))
        .bind(limit as i64)
        .bind(topic_filter(scope))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OutboxError::store_with_source("failed to fetch pending outbox records", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_processed(&self, id: i64) -> Result<bool, OutboxError> {
        let result =
            sqlx::query("UPDATE outbox_record SET processed = NOW() WHERE id = $1 AND processed IS NULL")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| OutboxError::store_with_source("failed to mark record processed", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find(&self, id: i64) -> Result<Option<OutboxRecord>, OutboxError> {
        let row = sqlx::query_as::<_, OutboxRecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM outbox_record WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| OutboxError::store_with_source("failed to load outbox record", e))?;

        Ok(row.map(Into::into))
    }

    async fn count_unprocessed(&self, scope: &TopicScope) -> Result<u64, OutboxError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM outbox_record
            WHERE processed IS NULL
              AND ($1::TEXT[] IS NULL OR topic = ANY($1))
            "#,
        )
        .bind(topic_filter(scope))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| OutboxError::store_with_source("failed to count pending outbox records", e))?;

        Ok(count.0 as u64)
    }

    async fn prune_processed(&self, older_than: Duration) -> Result<u64, OutboxError> {
        let result = sqlx::query(
            r#"
            DELETE FROM outbox_record
            WHERE processed IS NOT NULL
              AND processed < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(older_than.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxError::store_with_source("failed to prune processed records", e))?;

        Ok(result.rows_affected())
    }
}

/// Insert a pending record on `conn`, which is expected to be inside a transaction.
pub(crate) async fn insert_record(
    conn: &mut PgConnection,
    record: NewOutboxRecord,
) -> Result<OutboxRecord, OutboxError> {
    let row = sqlx::query_as::<_, OutboxRecordRow>(&format!(
        r#"
        INSERT INTO outbox_record (topic, key, value, headers)
        VALUES ($1, $2, $3, $4)
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(&record.topic)
    .bind(&record.key)
    .bind(&record.value)
    .bind(Json(&record.headers))
    .fetch_one(conn)
    .await
    .map_err(|e| OutboxError::store_with_source("failed to append outbox record", e))?;

    Ok(row.into())
}

fn topic_filter(scope: &TopicScope) -> Option<Vec<String>> {
    scope.as_slice().map(<[String]>::to_vec)
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRecordRow {
    id: i64,
    topic: String,
    key: String,
    value: Vec<u8>,
    headers: Json<Headers>,
    created: DateTime<Utc>,
    processed: Option<DateTime<Utc>>,
}

impl From<OutboxRecordRow> for OutboxRecord {
    fn from(row: OutboxRecordRow) -> Self {
        OutboxRecord {
            id: row.id,
            topic: row.topic,
            key: row.key,
            value: row.value,
            headers: row.headers.0,
            created: row.created,
            processed: row.processed,
        }
    }
}
