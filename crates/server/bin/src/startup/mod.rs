//! Startup module - wires the PostgreSQL stores, the JetStream publisher and
//! the relay together, then runs until a shutdown signal arrives.
//!
//! Any failure before the relay is running is returned to `main` and ends
//! the process with a non-zero exit. After that, store and broker errors are
//! contained in the relay loop.

mod shutdown;

use crate::config::RelayServerConfig;
use outbox_core::{start_outbox_cleanup_worker, OutboxRelay};
use outbox_nats::NatsPublisher;
use outbox_pg::{PostgresLockStore, PostgresOutboxStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use shutdown::wait_for_signal;

/// Current application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the relay process until SIGINT or SIGTERM.
pub async fn run(config: RelayServerConfig) -> anyhow::Result<()> {
    let relay_config = config.relay_config();
    info!(
        version = APP_VERSION,
        instance_id = %relay_config.instance_id,
        lock_name = %relay_config.lock_name,
        "Starting outbox relay"
    );

    // Step 1: Connect to database
    let pool = connect_to_database(&config).await?;
    info!("✓ Database connected");

    // Step 2: Schema
    outbox_pg::migrate(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to migrate outbox schema: {}", e))?;
    info!("✓ Outbox schema ready");

    // Step 3: Broker
    let publisher = NatsPublisher::connect(config.nats_publisher_config()).await?;
    let created = publisher.ensure_stream().await?;
    info!(stream = %config.nats.stream, created, "✓ JetStream stream ready");

    // Step 4: Relay and cleanup
    let store = Arc::new(PostgresOutboxStore::new(pool.clone()));
    let locks = Arc::new(PostgresLockStore::new(pool.clone()));
    let relay = OutboxRelay::new(store.clone(), locks, Arc::new(publisher), relay_config).start()?;

    let (cleanup_tx, _) = broadcast::channel(1);
    let cleanup = config
        .cleanup
        .enabled
        .then(|| start_outbox_cleanup_worker(store, config.cleanup_config(), &cleanup_tx));

    info!("✓ Outbox relay running");

    let reason = wait_for_signal().await;
    info!(%reason, "Shutting down gracefully...");

    let metrics = relay.metrics();
    relay.stop().await?;

    if let Some((cleanup_metrics, handle)) = cleanup {
        let _ = cleanup_tx.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "Cleanup worker did not stop cleanly");
        }
        info!(
            records_deleted = cleanup_metrics.records_deleted_count(),
            "Cleanup worker stopped"
        );
    }

    pool.close().await;
    info!(
        cycles = metrics.cycles,
        records_published = metrics.records_published,
        publish_failures = metrics.publish_failures,
        "Outbox relay stopped"
    );

    Ok(())
}

/// Connect to database.
async fn connect_to_database(config: &RelayServerConfig) -> anyhow::Result<sqlx::PgPool> {
    info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.pool_size)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    Ok(pool)
}
