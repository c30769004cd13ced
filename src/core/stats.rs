//! Aggregate statistics and the periodic stats reporter.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::events::{EventBus, OrchestratorEvent};
use crate::core::task::TaskResult;
use crate::core::worker::WorkerState;
use crate::util::clock::elapsed_ms;

/// Default interval between `StatsUpdated` events.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Point-in-time view of orchestrator activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    /// Tasks accepted by `submit` (retries excluded).
    pub total_queued: u64,
    /// Attempts that succeeded.
    pub total_completed: u64,
    /// Attempts that failed.
    pub total_failed: u64,
    /// Queued tasks dropped after `cancel`.
    pub total_cancelled: u64,
    /// Retries scheduled for retryable failures.
    pub total_retries: u64,
    /// Completed tasks per second of uptime.
    pub throughput_per_sec: f64,
    /// Workers whose loop is still running.
    pub active_workers: usize,
    /// Workers currently executing a task.
    pub busy_workers: usize,
    /// Workers spawned at start.
    pub total_workers: usize,
    /// When `start` ran, in milliseconds since epoch.
    pub started_at_ms: Option<u128>,
    /// Milliseconds since `start`.
    pub uptime_ms: u128,
}

#[derive(Debug, Default)]
struct StatsCounters {
    queued: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
    retries: u64,
    started_at_ms: Option<u128>,
}

/// Shared counters behind a single lock. Every update is a handful of
/// increments; nothing else happens while the lock is held.
#[derive(Debug, Default)]
pub struct StatsCell {
    counters: Mutex<StatsCounters>,
}

impl StatsCell {
    /// Fresh counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start time used for uptime and throughput.
    pub fn mark_started(&self, at_ms: u128) {
        self.counters.lock().started_at_ms = Some(at_ms);
    }

    /// Count a submitted task.
    pub fn record_queued(&self) {
        self.counters.lock().queued += 1;
    }

    /// Undo `record_queued` for a submission its queue refused.
    pub fn retract_queued(&self) {
        let mut c = self.counters.lock();
        c.queued = c.queued.saturating_sub(1);
    }

    /// Count one finished attempt.
    pub fn record_result(&self, result: &TaskResult) {
        let mut c = self.counters.lock();
        if result.success {
            c.completed += 1;
        } else {
            c.failed += 1;
        }
    }

    /// Count a cancelled task.
    pub fn record_cancelled(&self) {
        self.counters.lock().cancelled += 1;
    }

    /// Count a scheduled retry.
    pub fn record_retry(&self) {
        self.counters.lock().retries += 1;
    }

    /// Snapshot counters and derive throughput.
    #[must_use]
    pub fn snapshot(&self, workers: &[Arc<WorkerState>]) -> OrchestratorStats {
        let c = self.counters.lock();
        let (queued, completed, failed, cancelled, retries, started_at_ms) =
            (c.queued, c.completed, c.failed, c.cancelled, c.retries, c.started_at_ms);
        drop(c);

        let uptime_ms = started_at_ms.map_or(0, elapsed_ms);
        OrchestratorStats {
            total_queued: queued,
            total_completed: completed,
            total_failed: failed,
            total_cancelled: cancelled,
            total_retries: retries,
            throughput_per_sec: throughput(completed, uptime_ms),
            active_workers: workers.iter().filter(|w| w.is_alive()).count(),
            busy_workers: workers.iter().filter(|w| w.current_task().is_some()).count(),
            total_workers: workers.len(),
            started_at_ms,
            uptime_ms,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn throughput(completed: u64, uptime_ms: u128) -> f64 {
    if uptime_ms == 0 {
        return 0.0;
    }
    completed as f64 / (uptime_ms as f64 / 1000.0)
}

/// Publish a `StatsUpdated` snapshot every `interval` until cancelled.
pub(crate) async fn run_stats_reporter(
    stats: Arc<StatsCell>,
    workers: Vec<Arc<WorkerState>>,
    events: EventBus,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately; skip it so the first report covers a full interval.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = stats.snapshot(&workers);
                debug!(
                    completed = snapshot.total_completed,
                    failed = snapshot.total_failed,
                    active_workers = snapshot.active_workers,
                    "Stats snapshot"
                );
                events.publish(OrchestratorEvent::StatsUpdated(snapshot));
            }
        }
    }
    debug!("Stats reporter exiting");
}
