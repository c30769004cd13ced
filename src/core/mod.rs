//! Task model, failure classification, worker pool and orchestration.

pub(crate) mod aggregator;
pub mod allocation;
pub mod classifier;
pub mod error;
pub mod events;
pub mod handler;
pub mod orchestrator;
pub mod registry;
pub(crate) mod retry;
pub mod stats;
pub mod task;
pub mod worker;

pub use allocation::{
    allocate_workers, apply_overrides, total_workers, DEFAULT_HIGH_TRAFFIC,
    MIN_WORKERS_PER_PLATFORM,
};
pub use classifier::{classify, failure_result, Classification, ErrorKind, PlatformFailure};
pub use error::{AppResult, DispatchError};
pub use events::{EventBus, OrchestratorEvent};
pub use handler::{HandlerRegistry, PlatformHandler};
pub use orchestrator::Orchestrator;
pub use registry::{CancelOutcome, TaskRegistry};
pub use stats::{OrchestratorStats, StatsCell};
pub use task::{
    Platform, PlatformFamily, Task, TaskError, TaskId, TaskKind, TaskResult, TaskStatus, WorkerId,
};
pub use worker::{WorkerSnapshot, WorkerState, WorkerStatus};
