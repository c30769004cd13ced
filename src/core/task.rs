//! Task, result and platform data model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::classifier::ErrorKind;
use crate::util::clock::now_ms;

/// Opaque task identifier.
pub type TaskId = String;

/// Worker identifier, unique within one orchestrator.
pub type WorkerId = usize;

/// Social-media platforms served by the dispatcher. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Facebook pages and profiles.
    Facebook,
    /// Instagram business accounts.
    Instagram,
    /// Threads.
    Threads,
    /// Twitter / X.
    Twitter,
    /// TikTok.
    #[serde(rename = "tiktok")]
    TikTok,
    /// YouTube channels.
    #[serde(rename = "youtube")]
    YouTube,
    /// LinkedIn pages and profiles.
    #[serde(rename = "linkedin")]
    LinkedIn,
    /// Pinterest boards.
    Pinterest,
    /// Reddit accounts.
    Reddit,
}

/// Groups of platforms that share an API surface and error code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformFamily {
    /// Graph API platforms (Facebook, Instagram, Threads).
    Meta,
    /// Twitter / X API.
    Twitter,
    /// Everything without a code table.
    Other,
}

impl Platform {
    /// Number of platforms.
    pub const COUNT: usize = 9;

    /// Every platform, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Facebook,
        Self::Instagram,
        Self::Threads,
        Self::Twitter,
        Self::TikTok,
        Self::YouTube,
        Self::LinkedIn,
        Self::Pinterest,
        Self::Reddit,
    ];

    /// API family this platform belongs to.
    #[must_use]
    pub const fn family(self) -> PlatformFamily {
        match self {
            Self::Facebook | Self::Instagram | Self::Threads => PlatformFamily::Meta,
            Self::Twitter => PlatformFamily::Twitter,
            _ => PlatformFamily::Other,
        }
    }

    /// Stable lowercase name, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Threads => "threads",
            Self::Twitter => "twitter",
            Self::TikTok => "tiktok",
            Self::YouTube => "youtube",
            Self::LinkedIn => "linkedin",
            Self::Pinterest => "pinterest",
            Self::Reddit => "reddit",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            "threads" => Ok(Self::Threads),
            "twitter" | "x" => Ok(Self::Twitter),
            "tiktok" => Ok(Self::TikTok),
            "youtube" => Ok(Self::YouTube),
            "linkedin" => Ok(Self::LinkedIn),
            "pinterest" => Ok(Self::Pinterest),
            "reddit" => Ok(Self::Reddit),
            _ => Err(format!("unknown platform `{s}`")),
        }
    }
}

/// Kind of work a task requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Generate post text.
    GenerateContent,
    /// Generate an image asset.
    GenerateImage,
    /// Publish content immediately.
    PostContent,
    /// Schedule content for later publication.
    SchedulePost,
    /// Pull and analyze engagement metrics.
    AnalyzeMetrics,
    /// Remove a published post.
    DeletePost,
    /// Reply to a comment.
    ReplyComment,
    /// Refresh account profile and health data.
    SyncAccount,
}

impl TaskKind {
    /// Every task kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::GenerateContent,
        Self::GenerateImage,
        Self::PostContent,
        Self::SchedulePost,
        Self::AnalyzeMetrics,
        Self::DeletePost,
        Self::ReplyComment,
        Self::SyncAccount,
    ];
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not yet submitted.
    Pending,
    /// Waiting in a platform queue.
    Queued,
    /// Held by a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a classified failure.
    Failed,
    /// Cancelled before a worker started it.
    Cancelled,
}

impl TaskStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One unit of requested work scoped to a platform and a task kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Identifier; an empty id is replaced with a UUID on submission.
    pub id: TaskId,
    /// Requested work.
    pub kind: TaskKind,
    /// Target platform.
    pub platform: Platform,
    /// Informational priority; queues are FIFO regardless.
    pub priority: i32,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Platform account the task acts on.
    pub account_id: Option<String>,
    /// Handler-specific input.
    pub payload: serde_json::Value,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Timestamp of the latest attempt start.
    pub started_at_ms: Option<u128>,
    /// Timestamp of the latest attempt end.
    pub completed_at_ms: Option<u128>,
    /// Attempts already retried.
    pub retry_count: u32,
    /// Upper bound on retries.
    pub max_retries: u32,
}

impl Task {
    /// Default retry bound for new tasks.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Create a pending task without an id.
    #[must_use]
    pub fn new(platform: Platform, kind: TaskKind) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            platform,
            priority: 0,
            status: TaskStatus::Pending,
            account_id: None,
            payload: serde_json::Value::Null,
            created_at_ms: 0,
            started_at_ms: None,
            completed_at_ms: None,
            retry_count: 0,
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }

    /// Set an explicit id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the informational priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the account the task acts on.
    #[must_use]
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Attach handler input.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Override the retry bound.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Assign a fresh id if absent and stamp the creation time.
    pub(crate) fn prepare_for_submission(&mut self) {
        if self.id.trim().is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        if self.created_at_ms == 0 {
            self.created_at_ms = now_ms();
        }
        self.status = TaskStatus::Queued;
    }

    /// Reset attempt state so the task can be queued again.
    pub(crate) fn prepare_for_retry(&mut self) {
        self.retry_count += 1;
        self.status = TaskStatus::Queued;
        self.started_at_ms = None;
        self.completed_at_ms = None;
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn has_retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Classified failure attached to a [`TaskResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Taxonomy entry.
    pub kind: ErrorKind,
    /// Raw message reported by the platform or handler.
    pub message: String,
    /// Raw platform-specific error code.
    pub platform_code: Option<String>,
    /// HTTP status reported by the platform.
    pub http_status: Option<u16>,
}

/// Outcome of attempting one task once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Originating task.
    pub task_id: TaskId,
    /// Worker that produced this result.
    pub worker_id: WorkerId,
    /// Platform the task targeted.
    pub platform: Platform,
    /// Account the task acted on.
    pub account_id: Option<String>,
    /// Whether the handler succeeded.
    pub success: bool,
    /// Classified failure, present iff `success` is false.
    pub error: Option<TaskError>,
    /// Whether the failure may succeed on a later attempt.
    pub retryable: bool,
    /// Suggested backoff before retrying, in seconds.
    pub retry_after_secs: Option<u64>,
    /// Handler processing time.
    pub duration_ms: u64,
    /// Completion timestamp in milliseconds since epoch.
    pub completed_at_ms: u128,
    /// Handler output on success.
    pub output: Option<serde_json::Value>,
}

impl TaskResult {
    /// Build a successful result.
    #[must_use]
    pub fn success(
        task: &Task,
        worker_id: WorkerId,
        duration_ms: u64,
        output: serde_json::Value,
    ) -> Self {
        Self {
            task_id: task.id.clone(),
            worker_id,
            platform: task.platform,
            account_id: task.account_id.clone(),
            success: true,
            error: None,
            retryable: false,
            retry_after_secs: None,
            duration_ms,
            completed_at_ms: now_ms(),
            output: Some(output),
        }
    }

    /// Error kind, if this result is a failure.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trips_through_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_serde_name_matches_display() {
        let json = serde_json::to_string(&Platform::TikTok).unwrap();
        assert_eq!(json, format!("\"{}\"", Platform::TikTok));
    }

    #[test]
    fn test_prepare_assigns_id_once() {
        let mut task = Task::new(Platform::Reddit, TaskKind::PostContent);
        task.prepare_for_submission();
        let id = task.id.clone();
        assert!(!id.is_empty());
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.created_at_ms > 0);

        task.prepare_for_submission();
        assert_eq!(task.id, id);
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let mut task = Task::new(Platform::Reddit, TaskKind::PostContent).with_id("abc");
        task.prepare_for_submission();
        assert_eq!(task.id, "abc");
    }

    #[test]
    fn test_retry_budget() {
        let mut task = Task::new(Platform::Twitter, TaskKind::PostContent).with_max_retries(1);
        assert!(task.has_retries_left());
        task.prepare_for_retry();
        assert_eq!(task.retry_count, 1);
        assert!(!task.has_retries_left());
    }
}
