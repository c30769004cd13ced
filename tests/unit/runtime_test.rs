//! Tests for dispatch threads and API models

use std::time::{Duration, Instant};

use prometheus_social_dispatch::core::{Platform, Task, TaskKind};
use prometheus_social_dispatch::runtime::{
    join_with_deadline, spawn_runtime_thread, JoinOutcome, TaskSubmission,
};

#[test]
fn test_runtime_thread_has_tokio_runtime() {
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = spawn_runtime_thread("runtime-test".into(), 256 * 1024, move || async move {
        let name = std::thread::current().name().map(str::to_owned);
        tokio::task::yield_now().await;
        let _ = tx.send(name);
    })
    .unwrap();

    assert_eq!(
        join_with_deadline(handle, Instant::now() + Duration::from_secs(5)),
        JoinOutcome::Joined
    );
    assert_eq!(rx.recv().unwrap().as_deref(), Some("runtime-test"));
}

#[test]
fn test_straggler_is_detached() {
    let handle = spawn_runtime_thread("runtime-slow".into(), 256 * 1024, || async {
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .unwrap();
    let started = Instant::now();
    let outcome = join_with_deadline(handle, started + Duration::from_millis(20));
    assert_eq!(outcome, JoinOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[test]
fn test_submission_defaults() {
    let req: TaskSubmission =
        serde_json::from_str(r#"{"kind":"analyze_metrics","platform":"twitter","task_id":"given"}"#)
            .unwrap();
    let task = Task::from(req);
    assert_eq!(task.id, "given");
    assert_eq!(task.platform, Platform::Twitter);
    assert_eq!(task.kind, TaskKind::AnalyzeMetrics);
    assert_eq!(task.max_retries, Task::DEFAULT_MAX_RETRIES);
    assert!(task.payload.is_null());
}
