//! # Prometheus Social Dispatch
//!
//! Task orchestration and failure classification for social media automation.
//!
//! Work for each social platform (Facebook, Instagram, Threads, Twitter/X,
//! TikTok, YouTube, LinkedIn, Pinterest, Reddit) flows through its own bounded
//! queue to a fixed group of workers. Every attempt produces exactly one
//! [`TaskResult`](core::TaskResult); failures are classified into a closed
//! [`ErrorKind`](core::ErrorKind) taxonomy with retry advice, and retryable
//! failures are re-queued after their backoff.
//!
//! ## Key Features
//!
//! - **Per-platform backpressure**: bounded FIFO queues; `submit` waits while full
//! - **Static worker allocation**: `max(2, N / P)` per platform, leftovers to busy platforms
//! - **Dedicated threads**: each worker owns an OS thread with a current-thread Tokio runtime
//! - **Failure isolation**: handler errors and panics become classified results
//! - **Error classifier**: HTTP status, Meta/Twitter code tables, then message keywords
//! - **Cancellation and retries**: task registry for `cancel`/`status`, delayed re-enqueue
//! - **Observability**: broadcast lifecycle events, periodic stats, `tracing` logs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use prometheus_social_dispatch::builders::OrchestratorBuilder;
//! use prometheus_social_dispatch::config::OrchestratorConfig;
//! use prometheus_social_dispatch::core::{
//!     Platform, PlatformFailure, PlatformHandler, Task, TaskKind,
//! };
//! use prometheus_social_dispatch::infra::TracingSink;
//! use tokio_util::sync::CancellationToken;
//!
//! struct RedditPoster;
//!
//! #[async_trait]
//! impl PlatformHandler for RedditPoster {
//!     async fn handle(
//!         &self,
//!         task: &Task,
//!         _cancel: CancellationToken,
//!     ) -> Result<serde_json::Value, PlatformFailure> {
//!         Ok(serde_json::json!({ "post": task.id }))
//!     }
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = OrchestratorConfig::from_env().map_err(anyhow::Error::msg)?;
//! let orchestrator = OrchestratorBuilder::new(config)
//!     .handler_for_all_kinds(Platform::Reddit, Arc::new(RedditPoster))
//!     .sink(Arc::new(TracingSink))
//!     .build()?;
//! orchestrator.start()?;
//!
//! let id = orchestrator
//!     .submit(Task::new(Platform::Reddit, TaskKind::PostContent).with_account("acct-1"))
//!     .await?;
//! println!("queued {id}");
//!
//! orchestrator.stop();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Task model, classifier, workers and the orchestrator.
pub mod core;
/// Configuration models for the orchestrator, allocation and retries.
pub mod config;
/// Builders to construct an orchestrator from configuration.
pub mod builders;
/// Infrastructure adapters for queues and notification sinks.
pub mod infra;
/// Dispatch threads and the API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
