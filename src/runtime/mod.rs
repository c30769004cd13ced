//! Dispatch threads and the API surface.

pub mod api;
pub mod thread;

pub use api::{
    cancel_task, health, submit_task, task_status, Health, TaskStatusResponse, TaskSubmission,
};
pub use thread::{join_with_deadline, spawn_runtime_thread, JoinOutcome};
