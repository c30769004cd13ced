//! In-memory result sink.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::NotificationSink;
use crate::core::error::AppResult;
use crate::core::task::TaskResult;

/// Default number of results kept by [`InMemorySink`].
pub const DEFAULT_SINK_CAPACITY: usize = 10_000;

/// Bounded in-memory sink for tests and development. The oldest result is
/// evicted once the buffer is full.
#[derive(Debug)]
pub struct InMemorySink {
    results: Mutex<VecDeque<TaskResult>>,
    max_results: usize,
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new(DEFAULT_SINK_CAPACITY)
    }
}

impl InMemorySink {
    /// Create a sink keeping at most `max_results` results.
    #[must_use]
    pub fn new(max_results: usize) -> Self {
        let max_results = max_results.max(1);
        Self {
            results: Mutex::new(VecDeque::with_capacity(max_results.min(1024))),
            max_results,
        }
    }

    /// Snapshot of stored results, oldest first.
    #[must_use]
    pub fn results(&self) -> Vec<TaskResult> {
        self.results.lock().iter().cloned().collect()
    }

    /// Every stored attempt for `task_id`, oldest first.
    #[must_use]
    pub fn fetch(&self, task_id: &str) -> Vec<TaskResult> {
        self.results
            .lock()
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Number of stored results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }
}

#[async_trait]
impl NotificationSink for InMemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn notify(&self, result: &TaskResult) -> AppResult<()> {
        let mut results = self.results.lock();
        if results.len() >= self.max_results {
            results.pop_front();
        }
        results.push_back(result.clone());
        Ok(())
    }
}
