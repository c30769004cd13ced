//! Orchestrator configuration structures.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::allocation::{allocate_workers, apply_overrides, DEFAULT_HIGH_TRAFFIC};
use crate::core::events::DEFAULT_EVENT_BUFFER;
use crate::core::registry::DEFAULT_RETAINED_FINISHED;
use crate::core::stats::DEFAULT_STATS_INTERVAL;
use crate::core::task::{Platform, Task};
use crate::infra::queue::DEFAULT_QUEUE_CAPACITY;
use crate::runtime::thread::DEFAULT_STACK_SIZE;

/// Environment variable prefix read by [`OrchestratorConfig::from_env`].
pub const ENV_PREFIX: &str = "DISPATCH_";

/// Retry behaviour for retryable failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Re-queue retryable failures after their backoff.
    pub enabled: bool,
    /// Upper bound on retries, applied on top of each task's own bound.
    pub max_retries: u32,
    /// Cap on the classifier's suggested backoff, in milliseconds.
    pub max_backoff_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: Task::DEFAULT_MAX_RETRIES,
            max_backoff_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay to apply for a suggested backoff, honoring the cap.
    #[must_use]
    pub fn delay_for(&self, suggested_secs: u64) -> Duration {
        let suggested = Duration::from_secs(suggested_secs);
        self.max_backoff_ms
            .map_or(suggested, |cap| suggested.min(Duration::from_millis(cap)))
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Total worker budget. `None` uses the host's logical core count.
    pub worker_budget: Option<usize>,
    /// Platforms that get workers.
    pub platforms: Vec<Platform>,
    /// Platforms that receive leftover workers, in order.
    pub high_traffic_platforms: Vec<Platform>,
    /// Fixed worker counts that replace the computed allocation.
    pub worker_overrides: HashMap<Platform, usize>,
    /// Capacity of every platform queue.
    pub queue_capacity: usize,
    /// Grace period for `stop`, in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Interval between stats events, in milliseconds.
    pub stats_interval_ms: u64,
    /// Events buffered per subscriber.
    pub event_buffer: usize,
    /// Per-sink delivery timeout, in milliseconds.
    pub notify_timeout_ms: u64,
    /// Stack size for worker and service threads.
    pub thread_stack_size: usize,
    /// Finished tasks whose status stays queryable before the oldest is evicted.
    pub retained_finished: usize,
    /// Retry behaviour.
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_budget: None,
            platforms: Platform::ALL.to_vec(),
            high_traffic_platforms: DEFAULT_HIGH_TRAFFIC.to_vec(),
            worker_overrides: HashMap::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace_ms: 30_000,
            stats_interval_ms: duration_to_ms(DEFAULT_STATS_INTERVAL),
            event_buffer: DEFAULT_EVENT_BUFFER,
            notify_timeout_ms: 5_000,
            thread_stack_size: DEFAULT_STACK_SIZE,
            retained_finished: DEFAULT_RETAINED_FINISHED,
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total worker budget.
    #[must_use]
    pub const fn with_worker_budget(mut self, budget: usize) -> Self {
        self.worker_budget = Some(budget);
        self
    }

    /// Restrict the platforms that get workers.
    #[must_use]
    pub fn with_platforms(mut self, platforms: impl Into<Vec<Platform>>) -> Self {
        self.platforms = platforms.into();
        self
    }

    /// Replace the high-traffic list.
    #[must_use]
    pub fn with_high_traffic(mut self, platforms: impl Into<Vec<Platform>>) -> Self {
        self.high_traffic_platforms = platforms.into();
        self
    }

    /// Pin the worker count of one platform.
    #[must_use]
    pub fn with_workers_for(mut self, platform: Platform, workers: usize) -> Self {
        self.worker_overrides.insert(platform, workers);
        self
    }

    /// Set the per-platform queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = duration_to_ms(grace);
        self
    }

    /// Set the stats reporting interval.
    #[must_use]
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval_ms = duration_to_ms(interval);
        self
    }

    /// Set the per-sink delivery timeout.
    #[must_use]
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Bound the number of finished tasks kept in the status registry.
    #[must_use]
    pub const fn with_retained_finished(mut self, retained: usize) -> Self {
        self.retained_finished = retained;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Worker budget after falling back to the host core count.
    #[must_use]
    pub fn effective_worker_budget(&self) -> usize {
        self.worker_budget.unwrap_or_else(num_cpus::get)
    }

    /// Workers per platform: the computed allocation with overrides applied.
    #[must_use]
    pub fn worker_allocation(&self) -> BTreeMap<Platform, usize> {
        let mut allocation = allocate_workers(
            self.effective_worker_budget(),
            &self.platforms,
            &self.high_traffic_platforms,
        );
        apply_overrides(&mut allocation, &self.worker_overrides);
        allocation
    }

    /// Shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Stats reporting interval.
    #[must_use]
    pub const fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    /// Per-sink delivery timeout.
    #[must_use]
    pub const fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_budget == Some(0) {
            return Err("worker_budget must be greater than 0".into());
        }
        if self.platforms.is_empty() {
            return Err("at least one platform must be configured".into());
        }
        let mut seen = HashSet::with_capacity(self.platforms.len());
        if let Some(dup) = self.platforms.iter().find(|p| !seen.insert(**p)) {
            return Err(format!("platform `{dup}` is listed more than once"));
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.shutdown_grace_ms == 0 {
            return Err("shutdown_grace_ms must be greater than 0".into());
        }
        if self.stats_interval_ms == 0 {
            return Err("stats_interval_ms must be greater than 0".into());
        }
        if self.event_buffer == 0 {
            return Err("event_buffer must be greater than 0".into());
        }
        if self.notify_timeout_ms == 0 {
            return Err("notify_timeout_ms must be greater than 0".into());
        }
        if self.retained_finished == 0 {
            return Err("retained_finished must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DISPATCH_*` environment variables, loading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    ///
    /// Recognized: `WORKER_BUDGET`, `PLATFORMS` (comma separated),
    /// `HIGH_TRAFFIC_PLATFORMS`, `QUEUE_CAPACITY`, `SHUTDOWN_GRACE_MS`,
    /// `STATS_INTERVAL_MS`, `NOTIFY_TIMEOUT_MS`, `RETAINED_FINISHED`, `RETRY_ENABLED`,
    /// `RETRY_MAX_RETRIES`, `RETRY_MAX_BACKOFF_MS`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first unparsable variable or validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Build configuration from an arbitrary key lookup (keys without prefix).
    ///
    /// # Errors
    ///
    /// Returns a description of the first unparsable value or validation failure.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("WORKER_BUDGET") {
            cfg.worker_budget = Some(parse_value("WORKER_BUDGET", &v)?);
        }
        if let Some(v) = lookup("PLATFORMS") {
            cfg.platforms = parse_platforms(&v)?;
        }
        if let Some(v) = lookup("HIGH_TRAFFIC_PLATFORMS") {
            cfg.high_traffic_platforms = parse_platforms(&v)?;
        }
        if let Some(v) = lookup("QUEUE_CAPACITY") {
            cfg.queue_capacity = parse_value("QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("SHUTDOWN_GRACE_MS") {
            cfg.shutdown_grace_ms = parse_value("SHUTDOWN_GRACE_MS", &v)?;
        }
        if let Some(v) = lookup("STATS_INTERVAL_MS") {
            cfg.stats_interval_ms = parse_value("STATS_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("NOTIFY_TIMEOUT_MS") {
            cfg.notify_timeout_ms = parse_value("NOTIFY_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("RETAINED_FINISHED") {
            cfg.retained_finished = parse_value("RETAINED_FINISHED", &v)?;
        }
        if let Some(v) = lookup("RETRY_ENABLED") {
            cfg.retry.enabled = parse_value("RETRY_ENABLED", &v)?;
        }
        if let Some(v) = lookup("RETRY_MAX_RETRIES") {
            cfg.retry.max_retries = parse_value("RETRY_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("RETRY_MAX_BACKOFF_MS") {
            cfg.retry.max_backoff_ms = Some(parse_value("RETRY_MAX_BACKOFF_MS", &v)?);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{key}: {e}"))
}

fn parse_platforms(raw: &str) -> Result<Vec<Platform>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = OrchestratorConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.queue_capacity, 1000);
        assert_eq!(cfg.shutdown_grace(), Duration::from_secs(30));
        assert_eq!(cfg.platforms.len(), Platform::COUNT);
        assert!(cfg.effective_worker_budget() >= 1);
    }

    #[test]
    fn test_worker_allocation_applies_overrides() {
        let cfg = OrchestratorConfig::new()
            .with_worker_budget(8)
            .with_platforms([Platform::Twitter, Platform::Reddit])
            .with_workers_for(Platform::Reddit, 1);
        let allocation = cfg.worker_allocation();
        assert_eq!(allocation[&Platform::Twitter], 4);
        assert_eq!(allocation[&Platform::Reddit], 1);
    }

    #[test]
    fn test_retry_delay_cap() {
        let policy = RetryPolicy {
            max_backoff_ms: Some(250),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(3600), Duration::from_millis(250));
        assert_eq!(RetryPolicy::default().delay_for(30), Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup() {
        let vars = HashMap::from([
            ("WORKER_BUDGET", "12"),
            ("PLATFORMS", "twitter, reddit"),
            ("RETRY_ENABLED", "false"),
        ]);
        let cfg =
            OrchestratorConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(cfg.worker_budget, Some(12));
        assert_eq!(cfg.platforms, vec![Platform::Twitter, Platform::Reddit]);
        assert!(!cfg.retry.enabled);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = OrchestratorConfig::from_lookup(|k| {
            (k == "QUEUE_CAPACITY").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.contains("DISPATCH_QUEUE_CAPACITY"));
    }

    #[test]
    fn test_duplicate_platforms_rejected() {
        // "x" is an alias of twitter.
        let err = OrchestratorConfig::from_lookup(|k| {
            (k == "PLATFORMS").then(|| "twitter, reddit, x".to_string())
        })
        .unwrap_err();
        assert!(err.contains("more than once"), "{err}");

        let cfg = OrchestratorConfig::new().with_platforms([Platform::Reddit, Platform::Reddit]);
        assert!(cfg.validate().is_err());
    }
}
