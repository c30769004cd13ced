//! Sink that writes results to the tracing subscriber.

use async_trait::async_trait;
use tracing::{info, warn};

use super::NotificationSink;
use crate::core::error::AppResult;
use crate::core::task::TaskResult;

/// Logs each result at `info` (success) or `warn` (failure).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn notify(&self, result: &TaskResult) -> AppResult<()> {
        if result.success {
            info!(
                task_id = %result.task_id,
                platform = %result.platform,
                worker_id = result.worker_id,
                duration_ms = result.duration_ms,
                "Task completed"
            );
        } else {
            let kind = result.error_kind().map_or("unknown", |k| k.as_str());
            let message = result.error.as_ref().map_or("", |e| e.message.as_str());
            warn!(
                task_id = %result.task_id,
                platform = %result.platform,
                error_kind = kind,
                retryable = result.retryable,
                retry_after_secs = ?result.retry_after_secs,
                message,
                "Task failed"
            );
        }
        Ok(())
    }
}
