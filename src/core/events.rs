//! Lifecycle notifications published by the orchestrator.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::stats::OrchestratorStats;
use crate::core::task::{Task, TaskId, TaskResult};
use crate::core::worker::WorkerSnapshot;

/// Default number of events buffered per subscriber before it starts lagging.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Event emitted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// A task was accepted by `submit`.
    TaskReceived(Task),
    /// A task attempt succeeded.
    TaskCompleted(TaskResult),
    /// A task attempt failed; the result carries the classification.
    TaskFailed(TaskResult),
    /// A queued task was dropped after `cancel`.
    TaskCancelled {
        /// Cancelled task.
        task_id: TaskId,
    },
    /// A retryable failure was scheduled for another attempt.
    TaskRetryScheduled {
        /// Retried task.
        task_id: TaskId,
        /// Attempt number of the upcoming retry (1-based).
        attempt: u32,
        /// Delay before the task is re-queued, in milliseconds.
        backoff_ms: u64,
    },
    /// A worker started or stopped.
    WorkerStatusChanged(WorkerSnapshot),
    /// Periodic stats snapshot.
    StatsUpdated(OrchestratorStats),
}

/// Broadcast channel owned by one orchestrator.
///
/// Publishing never blocks; slow subscribers lag and skip events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: OrchestratorEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }

    /// Current number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
