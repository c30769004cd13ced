//! Composition root: owns the queues, workers and service threads.
//!
//! ```text
//! submit ─► queue[p] ─► worker(p, i) ─► result stream ─► aggregator ─► sinks
//!              ▲                                            │
//!              └──────────── retry (after backoff) ─────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::core::aggregator::{run_aggregator, AggregatorContext};
use crate::core::allocation::total_workers;
use crate::core::error::DispatchError;
use crate::core::events::{EventBus, OrchestratorEvent};
use crate::core::handler::HandlerRegistry;
use crate::core::registry::{CancelOutcome, TaskRegistry};
use crate::core::retry::RetryScheduler;
use crate::core::stats::{run_stats_reporter, OrchestratorStats, StatsCell};
use crate::core::task::{Platform, Task, TaskId, TaskStatus};
use crate::core::worker::{run_worker, WorkerContext, WorkerSnapshot, WorkerState};
use crate::infra::notify::NotificationSink;
use crate::infra::queue::{PlatformQueue, QueueSet};
use crate::runtime::thread::{join_with_deadline, spawn_runtime_thread, JoinOutcome};
use crate::util::clock::now_ms;

/// Extra time granted to the aggregator and reporter once the worker deadline passed.
const SERVICE_JOIN_SLACK: Duration = Duration::from_secs(1);

struct Running {
    cancel: CancellationToken,
    workers: Vec<(Arc<WorkerState>, JoinHandle<()>)>,
    aggregator: JoinHandle<()>,
    reporter: JoinHandle<()>,
}

enum Lifecycle {
    Idle,
    Running(Running),
    Stopped,
}

/// Social platform task orchestrator.
///
/// Built with [`OrchestratorBuilder`](crate::builders::OrchestratorBuilder).
/// Tasks may be submitted before [`start`](Self::start); they wait in their
/// platform queue until workers exist.
pub struct Orchestrator {
    config: OrchestratorConfig,
    queues: Arc<QueueSet>,
    handlers: Arc<HandlerRegistry>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    registry: Arc<TaskRegistry>,
    stats: Arc<StatsCell>,
    events: EventBus,
    workers: RwLock<Vec<Arc<WorkerState>>>,
    lifecycle: Mutex<Lifecycle>,
}

impl Orchestrator {
    pub(crate) fn new(
        config: OrchestratorConfig,
        handlers: HandlerRegistry,
        sinks: Vec<Arc<dyn NotificationSink>>,
    ) -> Self {
        Self {
            queues: Arc::new(QueueSet::new(config.queue_capacity)),
            events: EventBus::new(config.event_buffer),
            registry: Arc::new(TaskRegistry::with_retained(config.retained_finished)),
            config,
            handlers: Arc::new(handlers),
            sinks,
            stats: Arc::new(StatsCell::new()),
            workers: RwLock::new(Vec::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Spawn the workers, the result aggregator and the stats reporter.
    ///
    /// Calling `start` on a running orchestrator does nothing.
    ///
    /// # Errors
    ///
    /// `DispatchError::Stopped` once [`stop`](Self::stop) has run, or
    /// `DispatchError::Spawn` if a thread could not be created. After a spawn
    /// failure every thread already launched is cancelled.
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Stopped => return Err(DispatchError::Stopped),
            Lifecycle::Idle => {}
        }

        let allocation = self.config.worker_allocation();
        let cancel = CancellationToken::new();
        let running = self.launch(&allocation, &cancel).inspect_err(|_| cancel.cancel())?;

        self.stats.mark_started(now_ms());
        *self.workers.write() = running.workers.iter().map(|(s, _)| Arc::clone(s)).collect();
        *lifecycle = Lifecycle::Running(running);
        info!(
            workers = total_workers(&allocation),
            platforms = allocation.len(),
            "Orchestrator started"
        );
        Ok(())
    }

    fn launch(
        &self,
        allocation: &BTreeMap<Platform, usize>,
        cancel: &CancellationToken,
    ) -> Result<Running, DispatchError> {
        let stack_size = self.config.thread_stack_size;
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let mut workers = Vec::with_capacity(total_workers(allocation));
        for (&platform, &count) in allocation {
            debug!(platform = %platform, workers = count, "Spawning platform workers");
            for _ in 0..count {
                let state = Arc::new(WorkerState::new(workers.len(), platform));
                let ctx = WorkerContext {
                    queue: Arc::clone(self.queues.get(platform)),
                    handlers: Arc::clone(&self.handlers),
                    registry: Arc::clone(&self.registry),
                    events: self.events.clone(),
                    results: results_tx.clone(),
                    cancel: cancel.clone(),
                };
                let worker_state = Arc::clone(&state);
                let handle = spawn_runtime_thread(
                    format!("dispatch-{platform}-{}", state.id()),
                    stack_size,
                    move || run_worker(worker_state, ctx),
                )?;
                workers.push((state, handle));
            }
        }
        // Only workers hold senders now; the stream ends once they all exit.
        drop(results_tx);

        let aggregator_ctx = AggregatorContext {
            registry: Arc::clone(&self.registry),
            stats: Arc::clone(&self.stats),
            events: self.events.clone(),
            sinks: self.sinks.clone(),
            notify_timeout: self.config.notify_timeout(),
            retry: RetryScheduler {
                policy: self.config.retry.clone(),
                queues: Arc::clone(&self.queues),
                registry: Arc::clone(&self.registry),
                stats: Arc::clone(&self.stats),
                events: self.events.clone(),
                cancel: cancel.clone(),
            },
            cancel: cancel.clone(),
            drain_timeout: self.config.shutdown_grace(),
        };
        let aggregator = spawn_runtime_thread("dispatch-aggregator".into(), stack_size, move || {
            run_aggregator(aggregator_ctx, results_rx)
        })?;

        let stats = Arc::clone(&self.stats);
        let states: Vec<_> = workers.iter().map(|(s, _)| Arc::clone(s)).collect();
        let events = self.events.clone();
        let interval = self.config.stats_interval();
        let reporter_cancel = cancel.clone();
        let reporter = spawn_runtime_thread("dispatch-stats".into(), stack_size, move || {
            run_stats_reporter(stats, states, events, interval, reporter_cancel)
        })?;

        Ok(Running {
            cancel: cancel.clone(),
            workers,
            aggregator,
            reporter,
        })
    }

    /// Cancel all workers, close every queue and wait for threads to exit
    /// within the shutdown grace period.
    ///
    /// Workers still busy at the deadline are abandoned and marked not-live.
    /// Pending retries are dropped. Calling `stop` again does nothing.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        let running = match previous {
            Lifecycle::Stopped => return,
            Lifecycle::Idle => {
                self.queues.close_all();
                info!("Orchestrator stopped before start");
                return;
            }
            Lifecycle::Running(running) => running,
        };

        info!(grace_ms = self.config.shutdown_grace_ms, "Stopping orchestrator");
        running.cancel.cancel();
        self.queues.close_all();

        let deadline = Instant::now() + self.config.shutdown_grace();
        let mut abandoned = 0usize;
        for (state, handle) in running.workers {
            match join_with_deadline(handle, deadline) {
                JoinOutcome::Joined => {}
                JoinOutcome::Panicked => {
                    warn!(
                        worker_id = state.id(),
                        platform = %state.platform(),
                        "Worker thread panicked"
                    );
                }
                JoinOutcome::TimedOut => {
                    abandoned += 1;
                    warn!(
                        worker_id = state.id(),
                        platform = %state.platform(),
                        task_id = ?state.current_task(),
                        "Worker did not stop within grace period; abandoning"
                    );
                }
            }
            if state.is_alive() {
                state.set_alive(false);
                self.events
                    .publish(OrchestratorEvent::WorkerStatusChanged(state.snapshot()));
            }
        }

        let service_deadline = deadline.max(Instant::now() + SERVICE_JOIN_SLACK);
        for (name, handle) in [("aggregator", running.aggregator), ("stats", running.reporter)] {
            let outcome = join_with_deadline(handle, service_deadline);
            if outcome != JoinOutcome::Joined {
                warn!(thread = name, outcome = ?outcome, "Service thread did not stop cleanly");
            }
        }
        info!(abandoned, "Orchestrator stopped");
    }

    /// Whether workers are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    fn is_stopped(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Stopped)
    }

    /// Queue `task` on its platform queue, waiting while the queue is full.
    ///
    /// An empty id is replaced with a fresh UUID. Returns the task id.
    ///
    /// # Errors
    ///
    /// `DispatchError::Stopped` after [`stop`](Self::stop);
    /// `DispatchError::QueueClosed` if the queue closed while waiting.
    pub async fn submit(&self, mut task: Task) -> Result<TaskId, DispatchError> {
        let queue = self.admit(&mut task)?;
        let received = task.clone();
        if let Err(e) = queue.enqueue(task).await {
            self.reject(&received.id);
            return Err(e);
        }
        Ok(self.accept(received))
    }

    /// Blocking twin of [`submit`](Self::submit) for synchronous callers.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub fn submit_blocking(&self, mut task: Task) -> Result<TaskId, DispatchError> {
        let queue = self.admit(&mut task)?;
        let received = task.clone();
        if let Err(e) = queue.enqueue_blocking(task) {
            self.reject(&received.id);
            return Err(e);
        }
        Ok(self.accept(received))
    }

    fn admit(&self, task: &mut Task) -> Result<Arc<PlatformQueue>, DispatchError> {
        if self.is_stopped() {
            return Err(DispatchError::Stopped);
        }
        task.prepare_for_submission();
        self.registry.set(&task.id, TaskStatus::Queued);
        self.stats.record_queued();
        Ok(Arc::clone(self.queues.get(task.platform)))
    }

    fn accept(&self, task: Task) -> TaskId {
        debug!(task_id = %task.id, platform = %task.platform, kind = ?task.kind, "Task received");
        let id = task.id.clone();
        self.events.publish(OrchestratorEvent::TaskReceived(task));
        id
    }

    fn reject(&self, id: &str) {
        self.registry.remove(id);
        self.stats.retract_queued();
    }

    /// Cancel a queued task. A task already running is not interrupted.
    pub fn cancel(&self, task_id: &str) -> CancelOutcome {
        let outcome = self.registry.cancel(task_id);
        debug!(task_id, outcome = ?outcome, "Cancel requested");
        outcome
    }

    /// Last known status of a task.
    #[must_use]
    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.registry.status(task_id)
    }

    /// Forget tasks in a terminal status. Returns how many were removed.
    pub fn purge_finished(&self) -> usize {
        self.registry.purge_finished()
    }

    /// Snapshot of every worker spawned by `start`.
    #[must_use]
    pub fn workers(&self) -> Vec<WorkerSnapshot> {
        self.workers.read().iter().map(|w| w.snapshot()).collect()
    }

    /// Aggregate statistics.
    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        self.stats.snapshot(&self.workers.read())
    }

    /// Tasks waiting in the queue of `platform`.
    #[must_use]
    pub fn queue_depth(&self, platform: Platform) -> usize {
        self.queues.get(platform).len()
    }

    /// Waiting tasks per platform.
    #[must_use]
    pub fn queue_depths(&self) -> BTreeMap<Platform, usize> {
        self.queues.iter().map(|q| (q.platform(), q.len())).collect()
    }

    /// Receive lifecycle events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Signal only; joining here could block for the whole grace period.
        if let Lifecycle::Running(running) = &*self.lifecycle.lock() {
            running.cancel.cancel();
            self.queues.close_all();
            debug!("Orchestrator dropped without stop; threads detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::OrchestratorBuilder;
    use crate::core::classifier::PlatformFailure;
    use crate::core::handler::PlatformHandler;
    use crate::core::task::TaskKind;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl PlatformHandler for Echo {
        async fn handle(
            &self,
            task: &Task,
            _cancel: CancellationToken,
        ) -> Result<serde_json::Value, PlatformFailure> {
            Ok(serde_json::json!({ "id": task.id }))
        }
    }

    fn small() -> Orchestrator {
        OrchestratorBuilder::new(
            OrchestratorConfig::new()
                .with_worker_budget(2)
                .with_platforms([Platform::Reddit])
                .with_shutdown_grace(Duration::from_secs(2)),
        )
        .handler(Platform::Reddit, TaskKind::PostContent, Arc::new(Echo))
        .build()
        .unwrap()
    }

    #[test]
    fn test_lifecycle_transitions() {
        let orchestrator = small();
        assert!(!orchestrator.is_running());
        orchestrator.start().unwrap();
        orchestrator.start().unwrap();
        assert!(orchestrator.is_running());
        assert_eq!(orchestrator.workers().len(), 2);

        orchestrator.stop();
        orchestrator.stop();
        assert!(!orchestrator.is_running());
        assert!(orchestrator.workers().iter().all(|w| !w.alive));
        assert!(matches!(orchestrator.start(), Err(DispatchError::Stopped)));
    }

    #[test]
    fn test_submit_before_start_waits_in_queue() {
        let orchestrator = small();
        let id = orchestrator
            .submit_blocking(Task::new(Platform::Reddit, TaskKind::PostContent))
            .unwrap();
        assert!(!id.is_empty());
        assert_eq!(orchestrator.queue_depth(Platform::Reddit), 1);
        assert_eq!(orchestrator.status(&id), Some(TaskStatus::Queued));
        assert_eq!(orchestrator.stats().total_queued, 1);

        orchestrator.stop();
        let rejected =
            orchestrator.submit_blocking(Task::new(Platform::Reddit, TaskKind::PostContent));
        assert!(matches!(rejected, Err(DispatchError::Stopped)));
    }
}
