//! Task id → status index backing `cancel` and `status`.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::task::{TaskId, TaskStatus};

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The task was still queued and will be dropped when dequeued.
    Cancelled,
    /// A worker already holds the task; it runs to completion.
    AlreadyRunning,
    /// The task already reached a terminal status.
    AlreadyFinished,
    /// No task with that id was submitted.
    NotFound,
}

/// Finished tasks kept queryable by default.
pub const DEFAULT_RETAINED_FINISHED: usize = 10_000;

#[derive(Debug, Default)]
struct Entries {
    status: HashMap<TaskId, TaskStatus>,
    /// Cancelled ids still sitting in a queue; consumed by `claim`.
    pending_drop: HashSet<TaskId>,
    /// Ids that reached a terminal status, oldest first.
    finished: VecDeque<TaskId>,
}

/// Status index for submitted tasks.
///
/// Read-heavy; the map sits behind a `RwLock` and each operation holds it
/// briefly. At most `retained` finished tasks are kept; older ones are evicted
/// as new ones finish. A task cancelled while queued is never evicted or
/// purged before its worker has dropped it.
#[derive(Debug)]
pub struct TaskRegistry {
    entries: RwLock<Entries>,
    retained: usize,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_retained(DEFAULT_RETAINED_FINISHED)
    }
}

impl TaskRegistry {
    /// Empty registry with the default retention.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry keeping at most `retained` finished tasks.
    #[must_use]
    pub fn with_retained(retained: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            retained: retained.max(1),
        }
    }

    /// Record or overwrite the status of `id`.
    pub fn set(&self, id: &str, status: TaskStatus) {
        let mut entries = self.entries.write();
        entries.status.insert(id.to_owned(), status);
        if status.is_terminal() {
            entries.finished.push_back(id.to_owned());
            self.evict(&mut entries);
        }
    }

    fn evict(&self, entries: &mut Entries) {
        while entries.finished.len() > self.retained {
            let Some(oldest) = entries.finished.pop_front() else {
                break;
            };
            // A later retry may have moved the id back to a live status.
            let terminal = entries.status.get(&oldest).is_some_and(|s| s.is_terminal());
            if terminal && !entries.pending_drop.contains(&oldest) {
                entries.status.remove(&oldest);
            }
        }
    }

    /// Forget `id`.
    pub fn remove(&self, id: &str) {
        let mut entries = self.entries.write();
        entries.status.remove(id);
        entries.pending_drop.remove(id);
    }

    /// Current status of `id`.
    #[must_use]
    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.entries.read().status.get(id).copied()
    }

    /// Mark a queued task cancelled.
    pub fn cancel(&self, id: &str) -> CancelOutcome {
        let mut entries = self.entries.write();
        let outcome = match entries.status.get_mut(id) {
            None => CancelOutcome::NotFound,
            Some(status) => match *status {
                TaskStatus::Pending | TaskStatus::Queued => {
                    *status = TaskStatus::Cancelled;
                    CancelOutcome::Cancelled
                }
                TaskStatus::Running => CancelOutcome::AlreadyRunning,
                TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                    CancelOutcome::AlreadyFinished
                }
            },
        };
        if outcome == CancelOutcome::Cancelled {
            entries.pending_drop.insert(id.to_owned());
        }
        outcome
    }

    /// Transition `id` to running unless it was cancelled.
    ///
    /// Returns `false` when the worker must drop the task. Unknown ids are
    /// claimed so tasks enqueued directly on a queue still run.
    pub fn claim(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        if entries.pending_drop.remove(id) {
            return false;
        }
        match entries.status.get_mut(id) {
            Some(TaskStatus::Cancelled) => false,
            Some(status) => {
                *status = TaskStatus::Running;
                true
            }
            None => {
                entries.status.insert(id.to_owned(), TaskStatus::Running);
                true
            }
        }
    }

    /// Drop every entry in a terminal status and return how many were removed.
    ///
    /// Cancelled tasks still waiting to be dropped by a worker are kept.
    pub fn purge_finished(&self) -> usize {
        let mut guard = self.entries.write();
        let entries = &mut *guard;
        let before = entries.status.len();
        let pending = &entries.pending_drop;
        entries
            .status
            .retain(|id, status| !status.is_terminal() || pending.contains(id));
        entries.finished.clear();
        before - entries.status.len()
    }

    /// Number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().status.len()
    }

    /// Whether no task is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().status.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_outcomes() {
        let registry = TaskRegistry::new();
        registry.set("queued", TaskStatus::Queued);
        registry.set("running", TaskStatus::Running);
        registry.set("done", TaskStatus::Completed);

        assert_eq!(registry.cancel("queued"), CancelOutcome::Cancelled);
        assert_eq!(registry.status("queued"), Some(TaskStatus::Cancelled));
        assert_eq!(registry.cancel("queued"), CancelOutcome::AlreadyFinished);
        assert_eq!(registry.cancel("running"), CancelOutcome::AlreadyRunning);
        assert_eq!(registry.cancel("done"), CancelOutcome::AlreadyFinished);
        assert_eq!(registry.cancel("missing"), CancelOutcome::NotFound);
    }

    #[test]
    fn test_claim_respects_cancellation() {
        let registry = TaskRegistry::new();
        registry.set("a", TaskStatus::Queued);
        registry.set("b", TaskStatus::Queued);
        registry.cancel("b");

        assert!(registry.claim("a"));
        assert_eq!(registry.status("a"), Some(TaskStatus::Running));
        assert!(!registry.claim("b"));
        assert!(registry.claim("unknown"));
    }

    #[test]
    fn test_purge_finished() {
        let registry = TaskRegistry::new();
        registry.set("a", TaskStatus::Completed);
        registry.set("b", TaskStatus::Failed);
        registry.set("c", TaskStatus::Queued);

        assert_eq!(registry.purge_finished(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.status("c"), Some(TaskStatus::Queued));
    }

    #[test]
    fn test_purge_keeps_cancelled_task_until_dropped() {
        let registry = TaskRegistry::new();
        registry.set("waiting", TaskStatus::Queued);
        assert_eq!(registry.cancel("waiting"), CancelOutcome::Cancelled);

        assert_eq!(registry.purge_finished(), 0);
        assert_eq!(registry.status("waiting"), Some(TaskStatus::Cancelled));
        assert!(!registry.claim("waiting"));

        // The worker reports the drop; the entry is now an ordinary finished one.
        registry.set("waiting", TaskStatus::Cancelled);
        assert_eq!(registry.purge_finished(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_finished_entries_are_bounded() {
        let registry = TaskRegistry::with_retained(3);
        registry.set("queued", TaskStatus::Queued);
        registry.set("cancelled", TaskStatus::Queued);
        registry.cancel("cancelled");
        for i in 0..50 {
            let id = format!("done-{i}");
            registry.set(&id, TaskStatus::Queued);
            registry.set(&id, TaskStatus::Completed);
        }

        // Three finished tasks plus the queued and the pending cancellation.
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.status("done-49"), Some(TaskStatus::Completed));
        assert_eq!(registry.status("done-46"), None);
        assert_eq!(registry.status("queued"), Some(TaskStatus::Queued));
        assert!(!registry.claim("cancelled"));
    }

    #[test]
    fn test_retried_task_survives_eviction_of_its_failed_attempt() {
        let registry = TaskRegistry::with_retained(1);
        registry.set("flaky", TaskStatus::Failed);
        registry.set("flaky", TaskStatus::Queued);
        registry.set("other", TaskStatus::Completed);

        assert_eq!(registry.status("flaky"), Some(TaskStatus::Queued));
        assert_eq!(registry.status("other"), Some(TaskStatus::Completed));
    }
}
