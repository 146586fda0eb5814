//! PostgreSQL integration tests for the outbox store, lock store and relay.
//!
//! Run with: cargo test -p outbox-pg -- --ignored

mod common;

use anyhow::Result;
use common::get_test_database;
use outbox_core::{
    headers, CycleOutcome, Header, LockStore, OutboxError, OutboxRelay, OutboxStore,
    OutboxWriter, RawEvent, RelayConfig, TopicScope,
};
use outbox_pg::{PgTransactionRef, PgTransactionScope, PostgresLockStore, PostgresOutboxStore};
use outbox_testing::RecordingPublisher;
use std::sync::Arc;
use std::time::Duration;

const LOCK: &str = "outbox-relay";

async fn append(pool: &sqlx::PgPool, topic: &str, key: &str, count: usize) -> Result<()> {
    let writer = OutboxWriter::new();
    let mut tx = pool.begin().await?;
    for i in 0..count {
        writer
            .save_for_publishing(
                &mut PgTransactionRef::new(&mut tx),
                topic,
                key,
                &RawEvent::new("outbox.test.Value", format!("value{i}")),
                &[Header::new("h", format!("v{i}"))],
            )
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn migrate_is_idempotent() -> Result<()> {
    let db = get_test_database().await;

    outbox_pg::migrate(&db.pool).await?;
    outbox_pg::migrate(&db.pool).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn appended_records_round_trip_headers_and_order() -> Result<()> {
    let db = get_test_database().await;
    let store = PostgresOutboxStore::new(db.pool.clone());
    append(&db.pool, "orders", "key1", 3).await?;

    let pending = store.fetch_unprocessed(10, &TopicScope::All).await?;

    assert_eq!(pending.len(), 3);
    assert!(pending.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert_eq!(pending[0].value, b"value0".to_vec());
    assert_eq!(pending[2].headers["h"], "v2");
    assert_eq!(pending[0].headers[headers::VALUE_TYPE], "outbox.test.Value");
    assert!(pending.iter().all(|r| r.processed.is_none()));
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn rolled_back_append_leaves_no_row() -> Result<()> {
    let db = get_test_database().await;
    let store = PostgresOutboxStore::new(db.pool.clone());

    let mut tx = db.pool.begin().await?;
    OutboxWriter::new()
        .save_for_publishing(
            &mut PgTransactionRef::new(&mut tx),
            "orders",
            "key1",
            &RawEvent::new("outbox.test.Value", "value"),
            &[],
        )
        .await?;
    tx.rollback().await?;

    assert_eq!(store.count_unprocessed(&TopicScope::All).await?, 0);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn append_without_transaction_fails_and_leaves_no_row() -> Result<()> {
    let db = get_test_database().await;
    let store = PostgresOutboxStore::new(db.pool.clone());
    let mut scope = PgTransactionScope::none();

    let result = OutboxWriter::new()
        .save_for_publishing(
            &mut scope,
            "orders",
            "key1",
            &RawEvent::new("outbox.test.Value", "value"),
            &[],
        )
        .await;

    assert!(matches!(result, Err(OutboxError::NoActiveTransaction)));
    assert_eq!(store.count_unprocessed(&TopicScope::All).await?, 0);

    let mut scope = PgTransactionScope::begin(&db.pool).await?;
    OutboxWriter::new()
        .save_for_publishing(
            &mut scope,
            "orders",
            "key1",
            &RawEvent::new("outbox.test.Value", "value"),
            &[],
        )
        .await?;
    scope.commit().await?;
    assert_eq!(store.count_unprocessed(&TopicScope::All).await?, 1);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn mark_processed_is_idempotent() -> Result<()> {
    let db = get_test_database().await;
    let store = PostgresOutboxStore::new(db.pool.clone());
    append(&db.pool, "orders", "key1", 1).await?;
    let id = store.fetch_unprocessed(1, &TopicScope::All).await?[0].id;

    assert!(store.mark_processed(id).await?);
    let first = store.find(id).await?.and_then(|r| r.processed);
    assert!(!store.mark_processed(id).await?);

    assert!(first.is_some());
    assert_eq!(store.find(id).await?.and_then(|r| r.processed), first);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn topic_scope_and_prune() -> Result<()> {
    let db = get_test_database().await;
    let store = PostgresOutboxStore::new(db.pool.clone());
    append(&db.pool, "orders", "key1", 2).await?;
    append(&db.pool, "payments", "key1", 1).await?;

    let orders = store
        .fetch_unprocessed(10, &TopicScope::only(["orders"]))
        .await?;
    assert_eq!(orders.len(), 2);
    assert_eq!(store.count_unprocessed(&TopicScope::only(["payments"])).await?, 1);

    store.mark_processed(orders[0].id).await?;
    sqlx::query("UPDATE outbox_record SET processed = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(orders[0].id)
        .execute(&db.pool)
        .await?;
    store.mark_processed(orders[1].id).await?;

    let deleted = store.prune_processed(Duration::from_secs(3600)).await?;

    assert_eq!(deleted, 1);
    assert!(store.find(orders[0].id).await?.is_none());
    assert!(store.find(orders[1].id).await?.is_some());
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn lease_is_exclusive_until_it_expires() -> Result<()> {
    let db = get_test_database().await;
    let locks = PostgresLockStore::new(db.pool.clone());
    let lease = Duration::from_millis(200);

    assert!(locks.acquire_or_steal(LOCK, "a", lease).await?);
    assert!(locks.acquire_or_steal(LOCK, "a", lease).await?);
    assert!(!locks.acquire_or_steal(LOCK, "b", lease).await?);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(locks.acquire_or_steal(LOCK, "b", lease).await?);
    let entry = locks.current(LOCK).await?.expect("lock entry");
    assert!(entry.is_owned_by("b"));
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn release_only_clears_own_lease() -> Result<()> {
    let db = get_test_database().await;
    let locks = PostgresLockStore::new(db.pool.clone());
    let lease = Duration::from_secs(60);
    locks.acquire_or_steal(LOCK, "a", lease).await?;

    locks.release(LOCK, "b").await?;
    assert!(locks.current(LOCK).await?.expect("entry").is_owned_by("a"));

    locks.release(LOCK, "a").await?;
    assert_eq!(locks.current(LOCK).await?.expect("entry").owner, None);
    assert!(locks.acquire_or_steal(LOCK, "b", lease).await?);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn held_lease_blocks_steal_until_finished() -> Result<()> {
    let db = get_test_database().await;
    let locks = PostgresLockStore::new(db.pool.clone());
    let lease = Duration::from_millis(50);
    locks.acquire_or_steal(LOCK, "a", lease).await?;

    assert!(locks.hold(LOCK, "b").await?.is_none());
    let hold = locks.hold(LOCK, "a").await?.expect("owner may hold");

    let contender = {
        let locks = locks.clone();
        tokio::spawn(async move { locks.acquire_or_steal(LOCK, "b", lease).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!contender.is_finished());

    hold.finish().await?;

    assert!(contender.await??);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires Docker"]
async fn concurrent_relays_deliver_every_record_once_in_order() -> Result<()> {
    let db = get_test_database().await;
    let store = Arc::new(PostgresOutboxStore::new(db.pool.clone()));
    let locks = Arc::new(PostgresLockStore::new(db.pool.clone()));
    let publisher = Arc::new(RecordingPublisher::new());
    append(&db.pool, "topicConcurrentTest", "key1", 1000).await?;

    let relay = |instance: &str| {
        OutboxRelay::new(
            store.clone(),
            locks.clone(),
            publisher.clone(),
            RelayConfig::new()
                .with_instance_id(instance)
                .with_event_source("test")
                .with_poll_interval(Duration::ZERO)
                .with_lease_timeout(Duration::from_millis(20)),
        )
    };
    let first = relay("relay-1").start()?;
    let second = relay("relay-2").start()?;

    tokio::time::timeout(Duration::from_secs(60), async {
        while store.count_unprocessed(&TopicScope::All).await? > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Ok::<_, OutboxError>(())
    })
    .await??;
    first.stop().await?;
    second.stop().await?;

    let sequences = publisher.sequences();
    assert_eq!(sequences.len(), 1000);
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
    for message in publisher.messages() {
        assert_eq!(message.key, "key1");
        assert_eq!(message.headers[headers::SOURCE], "test");
        let id: i64 = message.headers[headers::SEQUENCE].parse()?;
        let record = store.find(id).await?.expect("record exists");
        assert_eq!(message.value, record.value);
        assert_eq!(message.headers["h"], record.headers["h"]);
    }
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn relay_cycle_keeps_lease_between_cycles() -> Result<()> {
    let db = get_test_database().await;
    let relay = OutboxRelay::new(
        Arc::new(PostgresOutboxStore::new(db.pool.clone())),
        Arc::new(PostgresLockStore::new(db.pool.clone())),
        Arc::new(RecordingPublisher::new()),
        RelayConfig::new().with_instance_id("relay-1"),
    );
    let locks = PostgresLockStore::new(db.pool.clone());

    assert!(matches!(relay.process_cycle().await?, CycleOutcome::Completed(_)));
    assert!(locks.current(LOCK).await?.expect("entry").is_owned_by("relay-1"));

    relay.release_lock().await?;
    assert_eq!(locks.current(LOCK).await?.expect("entry").owner, None);
    Ok(())
}
