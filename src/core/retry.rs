//! Delayed re-enqueue of retryable failures.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::core::events::{EventBus, OrchestratorEvent};
use crate::core::registry::TaskRegistry;
use crate::core::stats::StatsCell;
use crate::core::task::{Task, TaskResult, TaskStatus};
use crate::infra::queue::QueueSet;

/// Decides whether a failed attempt gets another try and, if so, puts the
/// task back on its platform queue once the backoff has elapsed.
///
/// Pending retries are spawned on the caller's runtime and abandoned when
/// `cancel` fires.
#[derive(Clone)]
pub(crate) struct RetryScheduler {
    pub policy: RetryPolicy,
    pub queues: Arc<QueueSet>,
    pub registry: Arc<TaskRegistry>,
    pub stats: Arc<StatsCell>,
    pub events: EventBus,
    pub cancel: CancellationToken,
}

impl RetryScheduler {
    /// Schedule another attempt for `task` if `result` calls for one.
    ///
    /// Returns `true` when a retry was scheduled.
    pub fn schedule(&self, mut task: Task, result: &TaskResult) -> bool {
        if !self.policy.enabled || result.success || !result.retryable {
            return false;
        }
        if !task.has_retries_left() || task.retry_count >= self.policy.max_retries {
            debug!(task_id = %task.id, attempts = task.retry_count + 1, "Retry budget exhausted");
            return false;
        }
        if self.cancel.is_cancelled() {
            return false;
        }

        let delay = self.policy.delay_for(result.retry_after_secs.unwrap_or(0));
        task.prepare_for_retry();
        self.registry.set(&task.id, TaskStatus::Queued);
        self.stats.record_retry();

        let backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        info!(
            task_id = %task.id,
            platform = %task.platform,
            attempt = task.retry_count,
            backoff_ms,
            "Retry scheduled"
        );
        self.events.publish(OrchestratorEvent::TaskRetryScheduled {
            task_id: task.id.clone(),
            attempt: task.retry_count,
            backoff_ms,
        });

        let queue = Arc::clone(self.queues.get(task.platform));
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(task_id = %task.id, "Pending retry dropped at shutdown");
                }
                () = tokio::time::sleep(delay) => {
                    let task_id = task.id.clone();
                    if let Err(e) = queue.enqueue(task).await {
                        warn!(task_id = %task_id, error = %e, "Failed to re-enqueue retry");
                    }
                }
            }
        });
        true
    }
}
