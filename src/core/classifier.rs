//! Platform failure classification.
//!
//! Turns the opaque error signal a platform returns (HTTP status, platform
//! error code, free-text message) into an [`ErrorKind`] plus retry advice.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. HTTP status (401, 403, 429, 5xx)
//! 2. Platform error code tables (only when a code is present)
//! 3. Keywords in the lowercased message (ban, rate limit, token, content)
//! 4. Fallback: [`ErrorKind::Unknown`], retryable after 30 seconds
//!
//! ```rust
//! use prometheus_social_dispatch::core::classifier::{classify, ErrorKind};
//! use prometheus_social_dispatch::core::Platform;
//!
//! let c = classify(Platform::Facebook, Some("613"), "Calls limit reached", None);
//! assert_eq!(c.kind, ErrorKind::RateLimited);
//! assert_eq!(c.retry_after_secs, Some(3600));
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::task::{Platform, PlatformFamily, TaskError, TaskId, TaskResult, WorkerId};
use crate::util::clock::now_ms;

/// Backoff after an HTTP 429 or a rate-limit keyword.
pub const RATE_LIMIT_BACKOFF_SECS: u64 = 3600;
/// Backoff after a 5xx response.
pub const PLATFORM_ERROR_BACKOFF_SECS: u64 = 60;
/// Backoff for unclassified failures.
pub const UNKNOWN_BACKOFF_SECS: u64 = 30;
/// Twitter's rate-limit window.
pub const TWITTER_RATE_LIMIT_BACKOFF_SECS: u64 = 900;

const BAN_KEYWORDS: &[&str] = &[
    "banned",
    "suspended",
    "disabled",
    "blocked",
    "restricted",
    "policy",
    "spam",
    "terminated",
    "locked",
];

const SOFT_BAN_MARKERS: &[&str] = &["suspend", "temporary"];

const RATE_LIMIT_KEYWORDS: &[&str] = &[
    "rate limit",
    "rate-limited",
    "too many",
    "quota exceeded",
    "throttled",
];

const TOKEN_KEYWORDS: &[&str] = &[
    "token expired",
    "expired token",
    "invalid token",
    "unauthorized",
    "invalid_grant",
    "session has expired",
];

/// Closed failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials rejected.
    AuthenticationError,
    /// Account permanently banned or disabled.
    AccountBanned,
    /// Account temporarily suspended.
    AccountSuspended,
    /// Platform rate limit hit.
    RateLimited,
    /// Access token expired or revoked.
    TokenExpired,
    /// Content refused by platform moderation.
    ContentRejected,
    /// Platform-side server failure.
    PlatformError,
    /// Nothing matched.
    Unknown,
}

impl ErrorKind {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationError => "authentication_error",
            Self::AccountBanned => "account_banned",
            Self::AccountSuspended => "account_suspended",
            Self::RateLimited => "rate_limited",
            Self::TokenExpired => "token_expired",
            Self::ContentRejected => "content_rejected",
            Self::PlatformError => "platform_error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Taxonomy entry.
    pub kind: ErrorKind,
    /// Whether a later attempt may succeed.
    pub retryable: bool,
    /// Suggested backoff in seconds; only set when retryable.
    pub retry_after_secs: Option<u64>,
}

impl Classification {
    const fn fatal(kind: ErrorKind) -> Self {
        Self {
            kind,
            retryable: false,
            retry_after_secs: None,
        }
    }

    const fn retry_after(kind: ErrorKind, secs: u64) -> Self {
        Self {
            kind,
            retryable: true,
            retry_after_secs: Some(secs),
        }
    }

    /// Suggested backoff as a duration.
    #[must_use]
    pub fn backoff(&self) -> Option<Duration> {
        self.retry_after_secs.map(Duration::from_secs)
    }
}

/// Raw failure signal reported by a platform handler.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct PlatformFailure {
    /// Platform-specific error code, e.g. Graph API `code`.
    pub code: Option<String>,
    /// Free-text message.
    pub message: String,
    /// HTTP status of the failing response.
    pub http_status: Option<u16>,
}

impl PlatformFailure {
    /// Failure carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            http_status: None,
        }
    }

    /// Attach a platform error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach an HTTP status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Classify this failure for `platform`.
    #[must_use]
    pub fn classify(&self, platform: Platform) -> Classification {
        classify(platform, self.code.as_deref(), &self.message, self.http_status)
    }
}

impl From<anyhow::Error> for PlatformFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::message(format!("{err:#}"))
    }
}

/// Classify a platform failure. See the module docs for rule order.
#[must_use]
pub fn classify(
    platform: Platform,
    error_code: Option<&str>,
    message: &str,
    http_status: Option<u16>,
) -> Classification {
    let lowered = message.to_lowercase();

    if let Some(status) = http_status {
        if let Some(c) = classify_status(status, &lowered) {
            return c;
        }
    }

    if let Some(code) = error_code.map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(c) = classify_code(platform, code) {
            return c;
        }
    }

    if let Some(c) = classify_message(&lowered) {
        return c;
    }

    Classification::retry_after(ErrorKind::Unknown, UNKNOWN_BACKOFF_SECS)
}

fn classify_status(status: u16, lowered: &str) -> Option<Classification> {
    match status {
        401 => Some(Classification::fatal(ErrorKind::AuthenticationError)),
        403 if contains_any(lowered, BAN_KEYWORDS) => {
            Some(Classification::fatal(ErrorKind::AccountBanned))
        }
        403 => Some(Classification::fatal(ErrorKind::AuthenticationError)),
        429 => Some(Classification::retry_after(
            ErrorKind::RateLimited,
            RATE_LIMIT_BACKOFF_SECS,
        )),
        s if s >= 500 => Some(Classification::retry_after(
            ErrorKind::PlatformError,
            PLATFORM_ERROR_BACKOFF_SECS,
        )),
        _ => None,
    }
}

struct CodeTable {
    ban: &'static [&'static str],
    rate_limit: &'static [&'static str],
    rate_limit_backoff_secs: u64,
}

const META_CODES: CodeTable = CodeTable {
    ban: &["190", "368"],
    rate_limit: &["4", "17", "32", "613"],
    rate_limit_backoff_secs: RATE_LIMIT_BACKOFF_SECS,
};

const TWITTER_CODES: CodeTable = CodeTable {
    ban: &["64", "326"],
    rate_limit: &["88", "185"],
    rate_limit_backoff_secs: TWITTER_RATE_LIMIT_BACKOFF_SECS,
};

const fn code_table(family: PlatformFamily) -> Option<&'static CodeTable> {
    match family {
        PlatformFamily::Meta => Some(&META_CODES),
        PlatformFamily::Twitter => Some(&TWITTER_CODES),
        PlatformFamily::Other => None,
    }
}

fn classify_code(platform: Platform, code: &str) -> Option<Classification> {
    let table = code_table(platform.family())?;
    if table.ban.contains(&code) {
        return Some(Classification::fatal(ErrorKind::AccountBanned));
    }
    if table.rate_limit.contains(&code) {
        return Some(Classification::retry_after(
            ErrorKind::RateLimited,
            table.rate_limit_backoff_secs,
        ));
    }
    None
}

fn classify_message(lowered: &str) -> Option<Classification> {
    if contains_any(lowered, BAN_KEYWORDS) {
        let kind = if contains_any(lowered, SOFT_BAN_MARKERS) {
            ErrorKind::AccountSuspended
        } else {
            ErrorKind::AccountBanned
        };
        return Some(Classification::fatal(kind));
    }
    if contains_any(lowered, RATE_LIMIT_KEYWORDS) {
        return Some(Classification::retry_after(
            ErrorKind::RateLimited,
            RATE_LIMIT_BACKOFF_SECS,
        ));
    }
    if contains_any(lowered, TOKEN_KEYWORDS) {
        return Some(Classification::fatal(ErrorKind::TokenExpired));
    }
    if lowered.contains("content") && (lowered.contains("reject") || lowered.contains("violat")) {
        return Some(Classification::fatal(ErrorKind::ContentRejected));
    }
    None
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Build a complete failed [`TaskResult`] by classifying `failure`.
///
/// Collaborators that report failures outside a worker (webhooks, schedulers)
/// use this to get a result with the same taxonomy the workers produce.
#[must_use]
pub fn failure_result(
    platform: Platform,
    failure: &PlatformFailure,
    task_id: impl Into<TaskId>,
    worker_id: WorkerId,
    duration: Duration,
    account_id: Option<String>,
) -> TaskResult {
    let classification = failure.classify(platform);
    TaskResult {
        task_id: task_id.into(),
        worker_id,
        platform,
        account_id,
        success: false,
        error: Some(TaskError {
            kind: classification.kind,
            message: failure.message.clone(),
            platform_code: failure.code.clone(),
            http_status: failure.http_status,
        }),
        retryable: classification.retryable,
        retry_after_secs: classification.retry_after_secs,
        duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        completed_at_ms: now_ms(),
        output: None,
    }
}
