//! API-facing request/response models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::orchestrator::Orchestrator;
use crate::core::registry::CancelOutcome;
use crate::core::stats::OrchestratorStats;
use crate::core::task::{Platform, Task, TaskId, TaskKind, TaskStatus};

/// Task submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Caller-chosen identifier; generated when absent.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Task kind.
    pub kind: TaskKind,
    /// Target platform.
    pub platform: Platform,
    /// Priority (informational).
    #[serde(default)]
    pub priority: i32,
    /// Account the task acts on.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Retry bound; the default applies when absent.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Handler input.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl From<TaskSubmission> for Task {
    fn from(req: TaskSubmission) -> Self {
        let mut task = Self::new(req.platform, req.kind)
            .with_priority(req.priority)
            .with_payload(req.payload);
        if let Some(id) = req.task_id {
            task = task.with_id(id);
        }
        if let Some(account) = req.account_id {
            task = task.with_account(account);
        }
        if let Some(max) = req.max_retries {
            task = task.with_max_retries(max);
        }
        task
    }
}

/// Task status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// Current status; `None` if the task is unknown or was purged.
    pub status: Option<TaskStatus>,
}

/// Cancellation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// What the request achieved.
    pub outcome: CancelOutcome,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag: running with at least one live worker.
    pub ok: bool,
    /// Whether the orchestrator is running.
    pub running: bool,
    /// Current statistics.
    pub stats: OrchestratorStats,
    /// Waiting tasks per platform.
    pub queue_depths: BTreeMap<Platform, usize>,
}

/// Submit a task and report its queued status.
///
/// # Errors
///
/// The rendered `DispatchError` when the orchestrator refuses the task.
pub async fn submit_task(
    orchestrator: &Orchestrator,
    req: TaskSubmission,
) -> Result<TaskStatusResponse, String> {
    let task_id = orchestrator
        .submit(req.into())
        .await
        .map_err(|e| e.to_string())?;
    Ok(task_status(orchestrator, task_id))
}

/// Status of one task.
#[must_use]
pub fn task_status(orchestrator: &Orchestrator, task_id: TaskId) -> TaskStatusResponse {
    let status = orchestrator.status(&task_id);
    TaskStatusResponse { task_id, status }
}

/// Cancel one task.
#[must_use]
pub fn cancel_task(orchestrator: &Orchestrator, task_id: TaskId) -> CancelResponse {
    let outcome = orchestrator.cancel(&task_id);
    CancelResponse { task_id, outcome }
}

/// Return a health payload.
#[must_use]
pub fn health(orchestrator: &Orchestrator) -> Health {
    let stats = orchestrator.stats();
    let running = orchestrator.is_running();
    Health {
        ok: running && stats.active_workers > 0,
        running,
        stats,
        queue_depths: orchestrator.queue_depths(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_maps_to_task() {
        let req: TaskSubmission = serde_json::from_str(
            r#"{"kind":"post_content","platform":"tiktok","account_id":"acct-1","max_retries":1}"#,
        )
        .unwrap();
        let task: Task = req.into();
        assert_eq!(task.platform, Platform::TikTok);
        assert_eq!(task.kind, TaskKind::PostContent);
        assert_eq!(task.account_id.as_deref(), Some("acct-1"));
        assert_eq!(task.max_retries, 1);
        assert!(task.id.is_empty());
    }
}
