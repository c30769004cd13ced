//! Configuration models for the orchestrator, allocation and retries.

pub mod orchestrator;

pub use orchestrator::{OrchestratorConfig, RetryPolicy, ENV_PREFIX};
