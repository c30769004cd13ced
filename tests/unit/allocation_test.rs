//! Tests for worker allocation

use std::collections::HashMap;

use prometheus_social_dispatch::core::{
    allocate_workers, apply_overrides, total_workers, Platform, DEFAULT_HIGH_TRAFFIC,
};

#[test]
fn test_forty_cores_over_nine_platforms() {
    let allocation = allocate_workers(40, &Platform::ALL, &DEFAULT_HIGH_TRAFFIC);
    for platform in Platform::ALL {
        let expected = if DEFAULT_HIGH_TRAFFIC.contains(&platform) { 5 } else { 4 };
        assert_eq!(allocation[&platform], expected, "{platform}");
    }
    assert_eq!(total_workers(&allocation), 40);
}

#[test]
fn test_small_budget_oversubscribes() {
    let allocation = allocate_workers(4, &Platform::ALL, &DEFAULT_HIGH_TRAFFIC);
    assert!(allocation.values().all(|&n| n == 2));
    assert_eq!(total_workers(&allocation), 18);
}

#[test]
fn test_allocation_is_deterministic() {
    let a = allocate_workers(23, &Platform::ALL, &DEFAULT_HIGH_TRAFFIC);
    let b = allocate_workers(23, &Platform::ALL, &DEFAULT_HIGH_TRAFFIC);
    assert_eq!(a, b);
}

#[test]
fn test_empty_platform_set() {
    assert!(allocate_workers(16, &[], &DEFAULT_HIGH_TRAFFIC).is_empty());
}

#[test]
fn test_override_zero_removes_platform() {
    let mut allocation = allocate_workers(8, &[Platform::Reddit, Platform::Pinterest], &[]);
    apply_overrides(
        &mut allocation,
        &HashMap::from([(Platform::Pinterest, 0), (Platform::Reddit, 1)]),
    );
    assert_eq!(allocation.len(), 1);
    assert_eq!(allocation[&Platform::Reddit], 1);
}
