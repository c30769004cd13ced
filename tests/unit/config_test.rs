//! Tests for configuration validation

use std::time::Duration;

use prometheus_social_dispatch::config::{OrchestratorConfig, RetryPolicy};
use prometheus_social_dispatch::core::Platform;

#[test]
fn test_default_config_is_valid() {
    let cfg = OrchestratorConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.stats_interval(), Duration::from_secs(5));
    assert_eq!(cfg.notify_timeout(), Duration::from_secs(5));
    assert!(cfg.retry.enabled);
    assert_eq!(cfg.retry.max_retries, 3);
}

#[test]
fn test_zero_queue_capacity_rejected() {
    let cfg = OrchestratorConfig::new().with_queue_capacity(0);
    assert!(cfg.validate().unwrap_err().contains("queue_capacity"));
}

#[test]
fn test_zero_grace_rejected() {
    let cfg = OrchestratorConfig::new().with_shutdown_grace(Duration::ZERO);
    assert!(cfg.validate().unwrap_err().contains("shutdown_grace_ms"));
}

#[test]
fn test_zero_stats_interval_rejected() {
    let cfg = OrchestratorConfig::new().with_stats_interval(Duration::ZERO);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_budget_and_empty_platforms_rejected() {
    assert!(OrchestratorConfig::new().with_worker_budget(0).validate().is_err());
    assert!(OrchestratorConfig::new()
        .with_platforms(Vec::<Platform>::new())
        .validate()
        .is_err());
}

#[test]
fn test_from_json_str_fills_defaults() {
    let cfg = OrchestratorConfig::from_json_str(
        r#"{
            "worker_budget": 40,
            "platforms": ["facebook", "twitter", "tiktok"],
            "worker_overrides": { "twitter": 1 },
            "retry": { "max_backoff_ms": 500 }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.worker_budget, Some(40));
    assert_eq!(cfg.queue_capacity, 1000);
    assert_eq!(cfg.worker_overrides.get(&Platform::Twitter), Some(&1));
    assert!(cfg.retry.enabled);
    assert_eq!(cfg.retry.max_backoff_ms, Some(500));

    let allocation = cfg.worker_allocation();
    assert_eq!(allocation[&Platform::Twitter], 1);
    assert!(allocation[&Platform::Facebook] >= 13);
}

#[test]
fn test_from_json_str_rejects_invalid() {
    assert!(OrchestratorConfig::from_json_str(r#"{"queue_capacity": 0}"#).is_err());
    assert!(OrchestratorConfig::from_json_str("not json").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_from_lookup_platform_lists() {
    let cfg = OrchestratorConfig::from_lookup(|key| match key {
        "PLATFORMS" => Some("x, instagram,reddit".into()),
        "HIGH_TRAFFIC_PLATFORMS" => Some("instagram".into()),
        "RETRY_MAX_BACKOFF_MS" => Some("250".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(
        cfg.platforms,
        vec![Platform::Twitter, Platform::Instagram, Platform::Reddit]
    );
    assert_eq!(cfg.high_traffic_platforms, vec![Platform::Instagram]);
    assert_eq!(cfg.retry.max_backoff_ms, Some(250));
}

#[test]
fn test_from_lookup_unknown_platform() {
    let result =
        OrchestratorConfig::from_lookup(|key| (key == "PLATFORMS").then(|| "myspace".to_string()));
    assert!(result.is_err());
}

#[test]
fn test_retry_policy_disabled() {
    let policy = RetryPolicy::disabled();
    assert!(!policy.enabled);
    assert_eq!(policy.delay_for(60), Duration::from_secs(60));
}
