//! Tests for the platform failure classifier

use std::time::Duration;

use prometheus_social_dispatch::core::{
    classify, failure_result, ErrorKind, Platform, PlatformFailure,
};

#[test]
fn test_rate_limit_status_ignores_message() {
    let c = classify(Platform::Reddit, None, "abc", Some(429));
    assert_eq!(c.kind, ErrorKind::RateLimited);
    assert!(c.retryable);
    assert_eq!(c.retry_after_secs, Some(3600));
    assert_eq!(c.backoff(), Some(Duration::from_secs(3600)));
}

#[test]
fn test_unauthorized_and_server_errors() {
    let auth = classify(Platform::YouTube, None, "rate limit", Some(401));
    assert_eq!(auth.kind, ErrorKind::AuthenticationError);
    assert!(!auth.retryable);

    let server = classify(Platform::Pinterest, None, "", Some(502));
    assert_eq!(server.kind, ErrorKind::PlatformError);
    assert_eq!(server.retry_after_secs, Some(60));
}

#[test]
fn test_meta_codes() {
    for platform in [Platform::Facebook, Platform::Instagram, Platform::Threads] {
        assert_eq!(classify(platform, Some("190"), "", None).kind, ErrorKind::AccountBanned);
        let rate = classify(platform, Some("17"), "", None);
        assert_eq!(rate.kind, ErrorKind::RateLimited);
        assert_eq!(rate.retry_after_secs, Some(3600));
    }
}

#[test]
fn test_twitter_codes_use_short_window() {
    let rate = classify(Platform::Twitter, Some("88"), "", None);
    assert_eq!(rate.kind, ErrorKind::RateLimited);
    assert_eq!(rate.retry_after_secs, Some(900));
    assert_eq!(classify(Platform::Twitter, Some("326"), "", None).kind, ErrorKind::AccountBanned);
}

#[test]
fn test_unknown_code_falls_back_to_keywords() {
    let c = classify(
        Platform::Facebook,
        Some("9999"),
        "Error validating access token: Session has expired",
        None,
    );
    assert_eq!(c.kind, ErrorKind::TokenExpired);
    assert!(!c.retryable);
}

#[test]
fn test_suspension_keyword() {
    let c = classify(
        Platform::Instagram,
        None,
        "Your account has been suspended temporarily",
        None,
    );
    assert_eq!(c.kind, ErrorKind::AccountSuspended);
    assert!(!c.retryable);
    assert!(c.retry_after_secs.is_none());
}

#[test]
fn test_content_rejection_keyword() {
    let c = classify(Platform::TikTok, None, "Content rejected by moderation", None);
    assert_eq!(c.kind, ErrorKind::ContentRejected);
    assert!(!c.retryable);
}

#[test]
fn test_default_is_unknown_and_retryable() {
    let c = classify(Platform::LinkedIn, None, "weird transient glitch", None);
    assert_eq!(c.kind, ErrorKind::Unknown);
    assert!(c.retryable);
    assert_eq!(c.retry_after_secs, Some(30));
}

#[test]
fn test_failure_from_anyhow() {
    let failure = PlatformFailure::from(anyhow::anyhow!("Too many requests, slow down"));
    assert_eq!(failure.classify(Platform::Reddit).kind, ErrorKind::RateLimited);
    assert!(failure.http_status.is_none());
}

#[test]
fn test_failure_result_carries_classification() {
    let failure = PlatformFailure::message("Application request limit reached").with_code("4");
    let result = failure_result(
        Platform::Facebook,
        &failure,
        "task-9",
        7,
        Duration::from_millis(42),
        Some("page-1".into()),
    );
    assert!(!result.success);
    assert_eq!(result.task_id, "task-9");
    assert_eq!(result.worker_id, 7);
    assert_eq!(result.duration_ms, 42);
    assert_eq!(result.account_id.as_deref(), Some("page-1"));
    assert!(result.retryable);
    assert_eq!(result.retry_after_secs, Some(3600));
    let error = result.error.unwrap();
    assert_eq!(error.kind, ErrorKind::RateLimited);
    assert_eq!(error.platform_code.as_deref(), Some("4"));
}

#[test]
fn test_error_kind_serializes_snake_case() {
    let json = serde_json::to_string(&ErrorKind::AccountBanned).unwrap();
    assert_eq!(json, format!("\"{}\"", ErrorKind::AccountBanned.as_str()));
}
