//! Relay counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the outbox relay.
#[derive(Debug, Default)]
pub struct OutboxRelayMetrics {
    /// Cycles that ran, contended or not.
    pub cycles: AtomicU64,
    /// Cycles that ended because another instance held the lease.
    pub contended_cycles: AtomicU64,
    pub records_published: AtomicU64,
    pub publish_failures: AtomicU64,
    pub store_errors: AtomicU64,
    pub last_batch_duration_ms: AtomicU64,
}

/// Point-in-time copy of [`OutboxRelayMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayMetricsSnapshot {
    pub cycles: u64,
    pub contended_cycles: u64,
    pub records_published: u64,
    pub publish_failures: u64,
    pub store_errors: u64,
    pub last_batch_duration_ms: u64,
}

impl OutboxRelayMetrics {
    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_contended(&self) {
        self.contended_cycles.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_published(&self, count: usize) {
        self.records_published
            .fetch_add(count as u64, Ordering::SeqCst);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_last_batch_duration(&self, ms: u64) {
        self.last_batch_duration_ms.store(ms, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> RelayMetricsSnapshot {
        RelayMetricsSnapshot {
            cycles: self.cycles.load(Ordering::SeqCst),
            contended_cycles: self.contended_cycles.load(Ordering::SeqCst),
            records_published: self.records_published.load(Ordering::SeqCst),
            publish_failures: self.publish_failures.load(Ordering::SeqCst),
            store_errors: self.store_errors.load(Ordering::SeqCst),
            last_batch_duration_ms: self.last_batch_duration_ms.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = OutboxRelayMetrics::default();
        metrics.record_cycle();
        metrics.record_cycle();
        metrics.record_contended();
        metrics.increment_published(4);
        metrics.record_publish_failure();
        metrics.record_store_error();
        metrics.set_last_batch_duration(150);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles, 2);
        assert_eq!(snapshot.contended_cycles, 1);
        assert_eq!(snapshot.records_published, 4);
        assert_eq!(snapshot.publish_failures, 1);
        assert_eq!(snapshot.store_errors, 1);
        assert_eq!(snapshot.last_batch_duration_ms, 150);
    }
}
