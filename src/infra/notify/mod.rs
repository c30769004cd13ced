//! Result notification sinks.
//!
//! The aggregator hands every finished attempt to each registered sink in
//! registration order. A sink that errors, panics or exceeds the delivery
//! timeout is logged and skipped; it never holds up the result stream.

pub mod log;
pub mod memory;

use async_trait::async_trait;

use crate::core::error::AppResult;
use crate::core::task::TaskResult;

pub use log::TracingSink;
pub use memory::InMemorySink;

/// Receiver of finished task results (webhooks, databases, dashboards).
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    /// Name used in logs when delivery fails.
    fn name(&self) -> &str {
        "sink"
    }

    /// Deliver one result.
    async fn notify(&self, result: &TaskResult) -> AppResult<()>;
}
