//! # Outbox Writer
//!
//! The only way to create outbox records. The caller passes the transaction
//! that carries its business change; the record is appended into it and
//! becomes visible to the relay only once the caller commits.
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! sqlx::query("UPDATE orders SET state = 'placed' WHERE id = $1")
//!     .bind(order_id)
//!     .execute(&mut *tx)
//!     .await?;
//! OutboxWriter::new()
//!     .save_for_publishing(
//!         &mut PgTransactionRef::new(&mut tx),
//!         "orders",
//!         &order_id,
//!         &JsonEvent::new("shop.OrderPlaced", &event),
//!         &[],
//!     )
//!     .await?;
//! tx.commit().await?;
//! ```

use crate::error::OutboxError;
use crate::event::OutboxEvent;
use crate::port::OutboxTransaction;
use crate::record::{headers, Header, Headers, NewOutboxRecord, OutboxRecord};
use tracing::debug;

/// Append-side service.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutboxWriter;

impl OutboxWriter {
    pub fn new() -> Self {
        Self
    }

    /// Record `event` for publishing to `topic` under `key`.
    ///
    /// Fails with [`OutboxError::NoActiveTransaction`] before encoding anything
    /// if `tx` is not active. Extra headers are applied after the type header;
    /// reusing a reserved header name is a caller contract violation and is
    /// not guarded (the later value wins in the map).
    pub async fn save_for_publishing<T, E>(
        &self,
        tx: &mut T,
        topic: &str,
        key: &str,
        event: &E,
        extra_headers: &[Header],
    ) -> Result<OutboxRecord, OutboxError>
    where
        T: OutboxTransaction + ?Sized,
        E: OutboxEvent + ?Sized,
    {
        if !tx.is_active() {
            return Err(OutboxError::NoActiveTransaction);
        }

        let value = event.encode()?;

        let mut record_headers = Headers::new();
        record_headers.insert(headers::VALUE_TYPE.to_string(), event.value_type().into_owned());
        for header in extra_headers {
            record_headers.insert(header.key.clone(), header.value.clone());
        }

        let record = tx
            .append(NewOutboxRecord::new(topic, key, value).with_headers(record_headers))
            .await?;

        debug!(
            record_id = record.id,
            topic = %record.topic,
            key = %record.key,
            "Outbox record appended"
        );

        Ok(record)
    }
}
