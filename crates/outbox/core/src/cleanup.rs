//! Outbox Cleanup Worker
//!
//! Optional background worker that periodically deletes records which were
//! relayed longer ago than the retention period. Pending records are never
//! touched.

use crate::port::OutboxStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{info, warn};

/// Configuration for the outbox cleanup worker.
#[derive(Debug, Clone)]
pub struct OutboxCleanupConfig {
    pub interval: Duration,
    /// Processed records older than this are deleted.
    pub retention: Duration,
    pub enabled: bool,
}

impl Default for OutboxCleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            retention: Duration::from_secs(7 * 24 * 3600),
            enabled: false,
        }
    }
}

impl OutboxCleanupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }
}

/// Metrics from the cleanup worker
#[derive(Debug, Default)]
pub struct OutboxCleanupMetrics {
    pub records_deleted: AtomicU64,
    /// Unix timestamp of the last successful run.
    pub last_cleanup: AtomicU64,
    pub errors: AtomicU64,
}

impl OutboxCleanupMetrics {
    pub fn records_deleted_count(&self) -> u64 {
        self.records_deleted.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }
}

/// Outbox cleanup worker.
pub struct OutboxCleanupWorker<S: OutboxStore + 'static> {
    store: Arc<S>,
    config: OutboxCleanupConfig,
    metrics: Arc<OutboxCleanupMetrics>,
    shutdown: broadcast::Receiver<()>,
}

impl<S: OutboxStore + 'static> OutboxCleanupWorker<S> {
    pub fn new(
        store: Arc<S>,
        config: OutboxCleanupConfig,
        metrics: Arc<OutboxCleanupMetrics>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            store,
            config,
            metrics,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        if !self.config.enabled {
            info!("Outbox cleanup worker is disabled");
            return;
        }

        info!(
            interval = ?self.config.interval,
            retention = ?self.config.retention,
            "Starting outbox cleanup worker"
        );

        let mut interval = time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Outbox cleanup worker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.cleanup().await;
                }
            }
        }
    }

    /// Run one pruning pass.
    pub async fn cleanup(&self) {
        match self.store.prune_processed(self.config.retention).await {
            Ok(deleted) => {
                self.metrics
                    .records_deleted
                    .fetch_add(deleted, Ordering::SeqCst);
                self.metrics
                    .last_cleanup
                    .store(chrono::Utc::now().timestamp() as u64, Ordering::SeqCst);
                if deleted > 0 {
                    info!(records_deleted = deleted, "Outbox cleanup completed");
                }
            }
            Err(e) => {
                warn!(error = %e, "Cleanup iteration failed");
                self.metrics.errors.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Spawn the cleanup worker, subscribed to `shutdown`.
pub fn start_outbox_cleanup_worker<S: OutboxStore + 'static>(
    store: Arc<S>,
    config: OutboxCleanupConfig,
    shutdown: &broadcast::Sender<()>,
) -> (Arc<OutboxCleanupMetrics>, JoinHandle<()>) {
    let metrics = Arc::new(OutboxCleanupMetrics::default());
    let worker = OutboxCleanupWorker::new(store, config, metrics.clone(), shutdown.subscribe());

    let handle = tokio::spawn(worker.run());

    (metrics, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutboxError;
    use crate::record::{OutboxRecord, TopicScope};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct PruneCountingStore {
        calls: Mutex<Vec<Duration>>,
        fail: bool,
    }

    #[async_trait]
    impl OutboxStore for PruneCountingStore {
        async fn fetch_unprocessed(
            &self,
            _limit: usize,
            _scope: &TopicScope,
        ) -> Result<Vec<OutboxRecord>, OutboxError> {
            Ok(Vec::new())
        }

        async fn mark_processed(&self, _id: i64) -> Result<bool, OutboxError> {
            Ok(false)
        }

        async fn find(&self, _id: i64) -> Result<Option<OutboxRecord>, OutboxError> {
            Ok(None)
        }

        async fn count_unprocessed(&self, _scope: &TopicScope) -> Result<u64, OutboxError> {
            Ok(0)
        }

        async fn prune_processed(&self, older_than: Duration) -> Result<u64, OutboxError> {
            if self.fail {
                return Err(OutboxError::store("delete failed"));
            }
            self.calls.lock().push(older_than);
            Ok(3)
        }
    }

    #[test]
    fn test_cleanup_config_defaults() {
        let config = OutboxCleanupConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert_eq!(config.retention, Duration::from_secs(604_800));

        let config = OutboxCleanupConfig::new()
            .with_interval(Duration::from_secs(60))
            .with_retention(Duration::from_secs(120))
            .enabled();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.retention, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_cleanup_prunes_with_retention() {
        let store = Arc::new(PruneCountingStore::default());
        let (tx, _) = broadcast::channel(1);
        let metrics = Arc::new(OutboxCleanupMetrics::default());
        let config = OutboxCleanupConfig::new()
            .with_retention(Duration::from_secs(30))
            .enabled();
        let worker = OutboxCleanupWorker::new(store.clone(), config, metrics.clone(), tx.subscribe());

        worker.cleanup().await;

        assert_eq!(*store.calls.lock(), vec![Duration::from_secs(30)]);
        assert_eq!(metrics.records_deleted_count(), 3);
        assert!(metrics.last_cleanup.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_cleanup_failure_counted() {
        let store = Arc::new(PruneCountingStore {
            fail: true,
            ..Default::default()
        });
        let (tx, _) = broadcast::channel(1);
        let metrics = Arc::new(OutboxCleanupMetrics::default());
        let worker = OutboxCleanupWorker::new(
            store,
            OutboxCleanupConfig::new().enabled(),
            metrics.clone(),
            tx.subscribe(),
        );

        worker.cleanup().await;

        assert_eq!(metrics.error_count(), 1);
        assert_eq!(metrics.records_deleted_count(), 0);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let store = Arc::new(PruneCountingStore::default());
        let (tx, _) = broadcast::channel(1);
        let config = OutboxCleanupConfig::new()
            .with_interval(Duration::from_millis(10))
            .enabled();

        let (metrics, handle) = start_outbox_cleanup_worker(store.clone(), config, &tx);
        while metrics.records_deleted_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(()).unwrap();

        handle.await.unwrap();
        assert!(!store.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_worker_returns_immediately() {
        let store = Arc::new(PruneCountingStore::default());
        let (tx, _) = broadcast::channel(1);

        let (_, handle) = start_outbox_cleanup_worker(store.clone(), OutboxCleanupConfig::new(), &tx);

        handle.await.unwrap();
        assert!(store.calls.lock().is_empty());
    }
}
