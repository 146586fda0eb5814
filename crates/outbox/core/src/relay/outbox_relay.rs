//! # Outbox Relay
//!
//! Background processor that moves pending outbox records to the broker.
//!
//! Each cycle:
//! 1. Acquires, renews or steals the named lease. Losing the race ends the
//!    cycle quietly: another instance is relaying.
//! 2. Pins the lease for the batch so a steal cannot interleave with it.
//! 3. Fetches pending records in ascending id order and publishes them one by
//!    one, marking each processed right after the broker acknowledged it.
//!    The first publish failure ends the batch; that record and everything
//!    after it stay pending for the next cycle.
//!
//! The lease is kept across cycles and only released on [`RunningRelay::stop`].

use super::config::RelayConfig;
use super::metrics::{OutboxRelayMetrics, RelayMetricsSnapshot};
use crate::error::RelayError;
use crate::port::{BrokerPublisher, LockStore, OutboxStore, OutgoingMessage};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a relay instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    AcquiringLock,
    Publishing,
    Stopped,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Idle => write!(f, "idle"),
            RelayState::AcquiringLock => write!(f, "acquiring_lock"),
            RelayState::Publishing => write!(f, "publishing"),
            RelayState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Result of publishing one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Records returned by the fetch.
    pub fetched: usize,
    /// Records published and marked processed.
    pub published: usize,
    /// Id of the record whose publish failed, if the batch was aborted.
    pub failed_at: Option<i64>,
    pub duration: Duration,
}

impl ProcessResult {
    pub fn empty() -> Self {
        Self {
            fetched: 0,
            published: 0,
            failed_at: None,
            duration: Duration::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fetched == 0
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another instance holds a live lease.
    Contended,
    /// The lease was stolen between acquiring and pinning it.
    LeaseLost,
    Completed(ProcessResult),
}

/// The relay processor.
pub struct OutboxRelay<S, L, P>
where
    S: OutboxStore + 'static,
    L: LockStore + 'static,
    P: BrokerPublisher + 'static,
{
    store: Arc<S>,
    locks: Arc<L>,
    publisher: Arc<P>,
    config: RelayConfig,
    metrics: Arc<OutboxRelayMetrics>,
    state: watch::Sender<RelayState>,
    stop_requested: Arc<AtomicBool>,
    consecutive_store_errors: AtomicU32,
}

impl<S, L, P> OutboxRelay<S, L, P>
where
    S: OutboxStore + 'static,
    L: LockStore + 'static,
    P: BrokerPublisher + 'static,
{
    pub fn new(store: Arc<S>, locks: Arc<L>, publisher: Arc<P>, config: RelayConfig) -> Self {
        let (state, _) = watch::channel(RelayState::Idle);
        Self {
            store,
            locks,
            publisher,
            config,
            metrics: Arc::new(OutboxRelayMetrics::default()),
            state,
            stop_requested: Arc::new(AtomicBool::new(false)),
            consecutive_store_errors: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> RelayMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run one cycle.
    ///
    /// Store failures abort the cycle and are returned; nothing after the
    /// failing call is published or marked.
    pub async fn process_cycle(&self) -> Result<CycleOutcome, RelayError> {
        self.metrics.record_cycle();
        let result = self.run_cycle().await;
        self.set_state(RelayState::Idle);

        match &result {
            Ok(_) => {
                self.consecutive_store_errors.store(0, Ordering::SeqCst);
            }
            Err(e) => self.report_store_error(e),
        }

        result
    }

    async fn run_cycle(&self) -> Result<CycleOutcome, RelayError> {
        let started = Instant::now();
        let lock_name = &self.config.lock_name;
        let owner = &self.config.instance_id;

        self.set_state(RelayState::AcquiringLock);
        let acquired = self
            .locks
            .acquire_or_steal(lock_name, owner, self.config.lease_timeout)
            .await?;

        if !acquired {
            self.metrics.record_contended();
            debug!(lock = %lock_name, instance = %owner, "Lease held by another instance");
            return Ok(CycleOutcome::Contended);
        }

        let Some(hold) = self.locks.hold(lock_name, owner).await? else {
            debug!(lock = %lock_name, instance = %owner, "Lease stolen before batch started");
            return Ok(CycleOutcome::LeaseLost);
        };

        self.set_state(RelayState::Publishing);
        let batch = self.publish_batch(started).await;
        let finished = hold.finish().await;

        let result = batch?;
        finished?;

        self.metrics
            .set_last_batch_duration(result.duration.as_millis() as u64);
        if !result.is_empty() {
            debug!(
                fetched = result.fetched,
                published = result.published,
                failed_at = ?result.failed_at,
                duration_ms = result.duration.as_millis() as u64,
                "Outbox batch processed"
            );
        }

        Ok(CycleOutcome::Completed(result))
    }

    async fn publish_batch(&self, started: Instant) -> Result<ProcessResult, RelayError> {
        let records = self
            .store
            .fetch_unprocessed(self.config.batch_size, &self.config.topic_scope)
            .await?;

        let fetched = records.len();
        let mut published = 0;
        let mut failed_at = None;

        for record in records {
            if self.is_stop_requested() {
                debug!(next_record = record.id, "Stop requested, ending batch early");
                break;
            }

            let message = OutgoingMessage::from_record(&record, self.config.source());
            match self.publisher.publish(message).await {
                Ok(ack) => {
                    if !self.store.mark_processed(record.id).await? {
                        debug!(record_id = record.id, "Record was already marked processed");
                    }
                    published += 1;
                    self.metrics.increment_published(1);
                    debug!(
                        record_id = record.id,
                        topic = %record.topic,
                        key = %record.key,
                        stream = ?ack.stream,
                        broker_sequence = ?ack.sequence,
                        "Record published"
                    );
                }
                Err(e) => {
                    self.metrics.record_publish_failure();
                    warn!(
                        record_id = record.id,
                        topic = %record.topic,
                        key = %record.key,
                        error = %e,
                        "Publish failed, record will be retried next cycle"
                    );
                    failed_at = Some(record.id);
                    break;
                }
            }
        }

        Ok(ProcessResult {
            fetched,
            published,
            failed_at,
            duration: started.elapsed(),
        })
    }

    /// Give up the lease if this instance still owns it.
    pub async fn release_lock(&self) -> Result<(), RelayError> {
        self.locks
            .release(&self.config.lock_name, &self.config.instance_id)
            .await?;
        Ok(())
    }

    /// Spawn the polling loop on the current runtime.
    pub fn start(self) -> Result<RunningRelay, RelayError> {
        self.config.validate()?;

        let relay = Arc::new(self);
        let wake = Arc::new(Notify::new());
        let running = RunningRelay {
            stop_requested: relay.stop_requested.clone(),
            wake: wake.clone(),
            state: relay.subscribe_state(),
            metrics: relay.metrics.clone(),
            handle: tokio::spawn(relay.run(wake)),
        };

        Ok(running)
    }

    async fn run(self: Arc<Self>, wake: Arc<Notify>) {
        info!(
            lock = %self.config.lock_name,
            instance = %self.config.instance_id,
            source = %self.config.source(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            lease_timeout_ms = self.config.lease_timeout.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Starting outbox relay"
        );

        while !self.is_stop_requested() {
            // Failures are logged and counted inside process_cycle.
            let _ = self.process_cycle().await;

            if self.is_stop_requested() {
                break;
            }

            if self.config.poll_interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    _ = wake.notified() => {}
                }
            }
        }

        if let Err(e) = self.release_lock().await {
            warn!(error = %e, lock = %self.config.lock_name, "Failed to release lease on shutdown");
        }
        self.set_state(RelayState::Stopped);
        info!(instance = %self.config.instance_id, "Outbox relay stopped");
    }

    fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: RelayState) {
        self.state.send_replace(state);
    }

    fn report_store_error(&self, err: &RelayError) {
        self.metrics.record_store_error();
        let failures = self.consecutive_store_errors.fetch_add(1, Ordering::SeqCst) + 1;

        if failures >= self.config.error_report_threshold {
            error!(
                consecutive_failures = failures,
                error = %err,
                lock = %self.config.lock_name,
                "Outbox store keeps failing, relay cycles are being aborted"
            );
        } else {
            warn!(
                consecutive_failures = failures,
                error = %err,
                "Relay cycle aborted by store error"
            );
        }
    }
}

/// Handle to a relay running in the background.
pub struct RunningRelay {
    stop_requested: Arc<AtomicBool>,
    wake: Arc<Notify>,
    state: watch::Receiver<RelayState>,
    metrics: Arc<OutboxRelayMetrics>,
    handle: JoinHandle<()>,
}

impl RunningRelay {
    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RelayState> {
        self.state.clone()
    }

    pub fn metrics(&self) -> RelayMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request shutdown and wait for it.
    ///
    /// The in-flight record is published and marked, the lease is released
    /// if still owned, and no further cycle starts.
    pub async fn stop(self) -> Result<(), RelayError> {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        self.handle
            .await
            .map_err(|e| RelayError::Join(e.to_string()))
    }
}
