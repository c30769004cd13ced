//! Tests for notification sinks

use prometheus_social_dispatch::core::{
    failure_result, Platform, PlatformFailure, Task, TaskKind, TaskResult,
};
use prometheus_social_dispatch::infra::{InMemorySink, NotificationSink, TracingSink};
use std::time::Duration;

fn success(id: &str) -> TaskResult {
    let task = Task::new(Platform::Threads, TaskKind::PostContent).with_id(id);
    TaskResult::success(&task, 0, 3, serde_json::json!({ "post_id": "p-1" }))
}

#[tokio::test]
async fn test_memory_sink_stores_attempts_per_task() {
    let sink = InMemorySink::new(8);
    assert!(sink.is_empty());

    let failed = failure_result(
        Platform::Threads,
        &PlatformFailure::message("Service unavailable").with_status(503),
        "a",
        0,
        Duration::from_millis(5),
        None,
    );
    sink.notify(&failed).await.unwrap();
    sink.notify(&success("a")).await.unwrap();
    sink.notify(&success("b")).await.unwrap();

    let attempts = sink.fetch("a");
    assert_eq!(attempts.len(), 2);
    assert!(!attempts[0].success);
    assert!(attempts[1].success);
    assert_eq!(sink.len(), 3);
    assert_eq!(sink.name(), "memory");
}

#[tokio::test]
async fn test_tracing_sink_accepts_everything() {
    let sink = TracingSink;
    sink.notify(&success("c")).await.unwrap();
    let failed = failure_result(
        Platform::Twitter,
        &PlatformFailure::message("Rate limit exceeded").with_code("88"),
        "d",
        1,
        Duration::ZERO,
        Some("acct".into()),
    );
    sink.notify(&failed).await.unwrap();
    assert_eq!(sink.name(), "tracing");
}
