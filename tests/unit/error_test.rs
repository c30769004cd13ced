//! Tests for error types

use prometheus_social_dispatch::core::{DispatchError, Platform};

#[test]
fn test_queue_full_error() {
    let err = DispatchError::QueueFull(Platform::TikTok);
    assert_eq!(format!("{err}"), "queue full: tiktok");
}

#[test]
fn test_queue_closed_error() {
    let err = DispatchError::QueueClosed(Platform::Twitter);
    assert_eq!(format!("{err}"), "queue closed: twitter");
}

#[test]
fn test_stopped_error() {
    assert_eq!(format!("{}", DispatchError::Stopped), "orchestrator stopped");
}

#[test]
fn test_invalid_config_error() {
    let err = DispatchError::InvalidConfig("queue_capacity must be greater than 0".into());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: queue_capacity must be greater than 0"
    );
}

#[test]
fn test_spawn_error_keeps_source() {
    use std::error::Error;

    let err = DispatchError::Spawn {
        name: "dispatch-reddit-0".into(),
        source: std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no stack"),
    };
    assert!(format!("{err}").contains("dispatch-reddit-0"));
    assert!(err.source().is_some());
}

#[test]
fn test_error_converts_to_anyhow() {
    let err: anyhow::Error = DispatchError::Stopped.into();
    assert_eq!(err.to_string(), "orchestrator stopped");
    assert!(matches!(
        err.downcast_ref::<DispatchError>(),
        Some(DispatchError::Stopped)
    ));
}
