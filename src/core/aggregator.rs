//! Consumer of the shared worker result stream.
//!
//! Every message is counted, recorded in the task registry, published on the
//! event bus and handed to the notification sinks before the next one is read.
//! Retry decisions are taken here so workers never re-enqueue themselves.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::events::{EventBus, OrchestratorEvent};
use crate::core::registry::TaskRegistry;
use crate::core::retry::RetryScheduler;
use crate::core::stats::StatsCell;
use crate::core::task::{Task, TaskResult, TaskStatus};
use crate::core::worker::WorkerMessage;
use crate::infra::notify::NotificationSink;

pub(crate) struct AggregatorContext {
    pub registry: Arc<TaskRegistry>,
    pub stats: Arc<StatsCell>,
    pub events: EventBus,
    pub sinks: Vec<Arc<dyn NotificationSink>>,
    pub notify_timeout: Duration,
    pub retry: RetryScheduler,
    pub cancel: CancellationToken,
    /// Upper bound on draining after cancellation.
    pub drain_timeout: Duration,
}

/// Consume `rx` until every worker has dropped its sender.
///
/// After cancellation the loop keeps draining so results produced by workers
/// finishing their last task are not lost, bounded by `drain_timeout`.
pub(crate) async fn run_aggregator(
    ctx: AggregatorContext,
    mut rx: mpsc::UnboundedReceiver<WorkerMessage>,
) {
    info!(sinks = ctx.sinks.len(), "Result aggregator started");
    loop {
        tokio::select! {
            biased;
            message = rx.recv() => match message {
                Some(message) => handle(&ctx, message).await,
                None => break,
            },
            () = ctx.cancel.cancelled() => {
                drain(&ctx, &mut rx).await;
                break;
            }
        }
    }
    info!("Result aggregator stopped");
}

async fn drain(ctx: &AggregatorContext, rx: &mut mpsc::UnboundedReceiver<WorkerMessage>) {
    debug!("Aggregator draining result stream");
    let drained = tokio::time::timeout(ctx.drain_timeout, async {
        while let Some(message) = rx.recv().await {
            handle(ctx, message).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            timeout_ms = ctx.drain_timeout.as_millis(),
            "Result stream still open at drain deadline"
        );
    }
}

async fn handle(ctx: &AggregatorContext, message: WorkerMessage) {
    match message {
        WorkerMessage::Finished { task, result } => on_finished(ctx, task, result).await,
        WorkerMessage::Cancelled(task) => {
            ctx.stats.record_cancelled();
            ctx.registry.set(&task.id, TaskStatus::Cancelled);
            ctx.events
                .publish(OrchestratorEvent::TaskCancelled { task_id: task.id });
        }
    }
}

async fn on_finished(ctx: &AggregatorContext, task: Task, result: TaskResult) {
    ctx.stats.record_result(&result);
    ctx.registry.set(&task.id, task.status);
    if result.success {
        ctx.events
            .publish(OrchestratorEvent::TaskCompleted(result.clone()));
    } else {
        ctx.events.publish(OrchestratorEvent::TaskFailed(result.clone()));
    }

    for sink in &ctx.sinks {
        notify_sink(sink.as_ref(), &result, ctx.notify_timeout).await;
    }

    ctx.retry.schedule(task, &result);
}

async fn notify_sink(sink: &dyn NotificationSink, result: &TaskResult, timeout: Duration) {
    let delivery = AssertUnwindSafe(sink.notify(result)).catch_unwind();
    match tokio::time::timeout(timeout, delivery).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => {
            warn!(
                sink = sink.name(),
                task_id = %result.task_id,
                error = %e,
                "Sink delivery failed"
            );
        }
        Ok(Err(_)) => {
            warn!(sink = sink.name(), task_id = %result.task_id, "Sink panicked");
        }
        Err(_) => {
            warn!(
                sink = sink.name(),
                task_id = %result.task_id,
                timeout_ms = timeout.as_millis(),
                "Sink delivery timed out"
            );
        }
    }
}
