//! Worker state and the per-platform execution loop.
//!
//! A worker is bound to one platform queue for its whole life. It suspends in
//! exactly one place, waiting for either cancellation or the next task, and it
//! never lets a handler failure (error or panic) end the loop.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::classifier::{failure_result, ErrorKind, PlatformFailure};
use crate::core::events::{EventBus, OrchestratorEvent};
use crate::core::handler::{HandlerRegistry, PlatformHandler};
use crate::core::registry::TaskRegistry;
use crate::core::task::{Platform, Task, TaskId, TaskResult, TaskStatus, WorkerId};
use crate::infra::queue::PlatformQueue;
use crate::util::clock::now_ms;

/// Coarse worker state derived from liveness and the task in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Waiting for a task.
    Idle,
    /// Executing a task.
    Running,
    /// Loop exited or worker abandoned at shutdown.
    Terminated,
}

/// Read-only view of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    /// Worker identifier.
    pub id: WorkerId,
    /// Platform the worker is bound to.
    pub platform: Platform,
    /// Whether the worker loop is live.
    pub alive: bool,
    /// Derived status.
    pub status: WorkerStatus,
    /// Task in flight.
    pub current_task: Option<TaskId>,
    /// Tasks taken off the queue and executed.
    pub processed: u64,
    /// Executed tasks that failed.
    pub failed: u64,
    /// Creation timestamp in milliseconds since epoch.
    pub started_at_ms: u128,
}

/// Shared, lock-light worker state read by snapshots and the stats reporter.
#[derive(Debug)]
pub struct WorkerState {
    id: WorkerId,
    platform: Platform,
    alive: AtomicBool,
    current_task: Mutex<Option<TaskId>>,
    processed: AtomicU64,
    failed: AtomicU64,
    started_at_ms: u128,
}

impl WorkerState {
    /// New, not yet live worker.
    #[must_use]
    pub fn new(id: WorkerId, platform: Platform) -> Self {
        Self {
            id,
            platform,
            alive: AtomicBool::new(false),
            current_task: Mutex::new(None),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started_at_ms: now_ms(),
        }
    }

    /// Worker identifier.
    #[must_use]
    pub const fn id(&self) -> WorkerId {
        self.id
    }

    /// Bound platform.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether the loop is live.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    /// Id of the task in flight.
    #[must_use]
    pub fn current_task(&self) -> Option<TaskId> {
        self.current_task.lock().clone()
    }

    fn begin(&self, task_id: &str) {
        *self.current_task.lock() = Some(task_id.to_owned());
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, success: bool) {
        if !success {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        *self.current_task.lock() = None;
    }

    /// Point-in-time view.
    #[must_use]
    pub fn snapshot(&self) -> WorkerSnapshot {
        let current_task = self.current_task();
        let alive = self.is_alive();
        let status = match (alive, current_task.is_some()) {
            (false, _) => WorkerStatus::Terminated,
            (true, true) => WorkerStatus::Running,
            (true, false) => WorkerStatus::Idle,
        };
        WorkerSnapshot {
            id: self.id,
            platform: self.platform,
            alive,
            status,
            current_task,
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            started_at_ms: self.started_at_ms,
        }
    }
}

/// Message a worker publishes on the shared result stream.
#[derive(Debug)]
pub(crate) enum WorkerMessage {
    /// One attempt finished; the task is returned for retry decisions.
    Finished {
        /// Task as executed.
        task: Task,
        /// Outcome of the attempt.
        result: TaskResult,
    },
    /// A task cancelled while queued was dropped without running.
    Cancelled(Task),
}

/// Everything a worker loop needs, cloned per worker.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub queue: Arc<PlatformQueue>,
    pub handlers: Arc<HandlerRegistry>,
    pub registry: Arc<TaskRegistry>,
    pub events: EventBus,
    pub results: mpsc::UnboundedSender<WorkerMessage>,
    pub cancel: CancellationToken,
}

/// Run the worker loop until cancellation or until its queue is closed and drained.
pub(crate) async fn run_worker(state: Arc<WorkerState>, ctx: WorkerContext) {
    state.set_alive(true);
    ctx.events
        .publish(OrchestratorEvent::WorkerStatusChanged(state.snapshot()));
    info!(worker_id = state.id, platform = %state.platform, "Worker started");

    loop {
        let task = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                debug!(worker_id = state.id, "Worker observed cancellation");
                break;
            }
            next = ctx.queue.dequeue() => match next {
                Some(task) => task,
                None => {
                    debug!(worker_id = state.id, "Worker queue closed, exiting");
                    break;
                }
            },
        };
        process_task(&state, &ctx, task).await;
    }

    state.set_alive(false);
    ctx.events
        .publish(OrchestratorEvent::WorkerStatusChanged(state.snapshot()));
    info!(worker_id = state.id, platform = %state.platform, "Worker stopped");
}

async fn process_task(state: &WorkerState, ctx: &WorkerContext, mut task: Task) {
    if !ctx.registry.claim(&task.id) {
        debug!(worker_id = state.id, task_id = %task.id, "Dropping cancelled task");
        task.status = TaskStatus::Cancelled;
        send(ctx, WorkerMessage::Cancelled(task));
        return;
    }

    task.status = TaskStatus::Running;
    task.started_at_ms = Some(now_ms());
    state.begin(&task.id);
    debug!(
        worker_id = state.id,
        task_id = %task.id,
        kind = ?task.kind,
        attempt = task.retry_count + 1,
        "Worker executing task"
    );

    let started = Instant::now();
    let outcome = match ctx.handlers.get(task.platform, task.kind) {
        Some(handler) => Some(invoke(handler.as_ref(), &task, ctx.cancel.clone()).await),
        None => None,
    };
    let duration = started.elapsed();

    let result = match outcome {
        Some(Ok(output)) => TaskResult::success(&task, state.id, duration_ms(duration), output),
        Some(Err(failure)) => failure_result(
            task.platform,
            &failure,
            task.id.clone(),
            state.id,
            duration,
            task.account_id.clone(),
        ),
        None => missing_handler_result(&task, state.id, duration),
    };

    task.status = if result.success {
        TaskStatus::Completed
    } else {
        TaskStatus::Failed
    };
    task.completed_at_ms = Some(result.completed_at_ms);
    state.finish(result.success);

    debug!(
        worker_id = state.id,
        task_id = %task.id,
        success = result.success,
        error_kind = ?result.error_kind(),
        duration_ms = result.duration_ms,
        "Worker completed task"
    );
    send(ctx, WorkerMessage::Finished { task, result });
}

/// Call the handler, turning a panic into a failure.
async fn invoke(
    handler: &dyn PlatformHandler,
    task: &Task,
    cancel: CancellationToken,
) -> Result<serde_json::Value, PlatformFailure> {
    match AssertUnwindSafe(handler.handle(task, cancel))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            warn!(task_id = %task.id, reason = %reason, "Platform handler panicked");
            Err(PlatformFailure::message(format!("handler panicked: {reason}")))
        }
    }
}

/// A missing handler is a wiring error, so it is never worth retrying.
fn missing_handler_result(task: &Task, worker_id: WorkerId, duration: Duration) -> TaskResult {
    let failure = PlatformFailure::message(format!(
        "no handler registered for {} / {:?}",
        task.platform, task.kind
    ));
    let mut result = failure_result(
        task.platform,
        &failure,
        task.id.clone(),
        worker_id,
        duration,
        task.account_id.clone(),
    );
    if let Some(error) = result.error.as_mut() {
        error.kind = ErrorKind::Unknown;
    }
    result.retryable = false;
    result.retry_after_secs = None;
    result
}

fn send(ctx: &WorkerContext, message: WorkerMessage) {
    if ctx.results.send(message).is_err() {
        warn!("Result stream closed; dropping worker message");
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
