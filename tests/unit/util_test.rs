//! Tests for utility helpers

use prometheus_social_dispatch::util::{elapsed_ms, init_tracing, now_ms};

#[test]
fn test_clock_is_monotonic_enough() {
    let start = now_ms();
    assert!(start > 0);
    assert!(elapsed_ms(start) < 5_000);
    assert_eq!(elapsed_ms(u128::MAX), 0);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!(component = "util_test", "Tracing initialized");
}
