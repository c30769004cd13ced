//! Static worker allocation across platforms.

use std::collections::{BTreeMap, HashMap};

use crate::core::task::Platform;

/// Minimum workers every platform receives, even when the budget is smaller.
pub const MIN_WORKERS_PER_PLATFORM: usize = 2;

/// Platforms that historically carry the most traffic, in tie-break order.
pub const DEFAULT_HIGH_TRAFFIC: [Platform; 4] = [
    Platform::Facebook,
    Platform::Instagram,
    Platform::TikTok,
    Platform::Twitter,
];

/// Split a worker budget across `platforms`.
///
/// Every platform gets `max(2, budget / P)` workers. Whatever is left of the
/// budget is then handed out one worker at a time, cycling through
/// `high_traffic` (entries not in `platforms` are skipped) until exhausted.
/// If the floor already exceeds the budget, nothing is left and the pool is
/// oversubscribed rather than starving any platform.
#[must_use]
pub fn allocate_workers(
    budget: usize,
    platforms: &[Platform],
    high_traffic: &[Platform],
) -> BTreeMap<Platform, usize> {
    let mut allocation = BTreeMap::new();
    if platforms.is_empty() {
        return allocation;
    }

    let per_platform = (budget / platforms.len()).max(MIN_WORKERS_PER_PLATFORM);
    for &platform in platforms {
        allocation.insert(platform, per_platform);
    }

    let mut remaining = budget.saturating_sub(per_platform * allocation.len());
    let boosted: Vec<Platform> = high_traffic
        .iter()
        .copied()
        .filter(|p| allocation.contains_key(p))
        .collect();
    if boosted.is_empty() {
        return allocation;
    }

    for platform in boosted.iter().cycle() {
        if remaining == 0 {
            break;
        }
        if let Some(count) = allocation.get_mut(platform) {
            *count += 1;
            remaining -= 1;
        }
    }
    allocation
}

/// Apply per-platform overrides on top of a computed allocation.
///
/// Overrides replace the computed count, floor included. A zero override
/// removes the platform's workers entirely.
pub fn apply_overrides(
    allocation: &mut BTreeMap<Platform, usize>,
    overrides: &HashMap<Platform, usize>,
) {
    for (&platform, &count) in overrides {
        if count == 0 {
            allocation.remove(&platform);
        } else {
            allocation.insert(platform, count);
        }
    }
}

/// Total workers in an allocation.
#[must_use]
pub fn total_workers(allocation: &BTreeMap<Platform, usize>) -> usize {
    allocation.values().sum()
}
