//! Platform handler abstraction and (platform, kind) dispatch table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::classifier::PlatformFailure;
use crate::core::task::{Platform, Task, TaskKind};

/// Executes one kind of work against one platform's API.
///
/// Handlers are shared by every worker of a platform and invoked repeatedly, so
/// they must be `Send + Sync` and hold no per-task state. A handler must return
/// promptly once `cancel` fires; the worker never aborts it.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_social_dispatch::core::{PlatformFailure, PlatformHandler, Task};
/// use tokio_util::sync::CancellationToken;
///
/// struct TweetPoster { client: TwitterClient }
///
/// #[async_trait]
/// impl PlatformHandler for TweetPoster {
///     async fn handle(&self, task: &Task, _cancel: CancellationToken)
///         -> Result<serde_json::Value, PlatformFailure>
///     {
///         let resp = self.client.post(&task.payload).await?;
///         if resp.status >= 400 {
///             return Err(PlatformFailure::message(resp.body).with_status(resp.status));
///         }
///         Ok(serde_json::json!({ "tweet_id": resp.id }))
///     }
/// }
/// ```
#[async_trait]
pub trait PlatformHandler: Send + Sync + 'static {
    /// Perform the task and return handler output, or the raw platform failure.
    async fn handle(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value, PlatformFailure>;
}

/// Two-key lookup table from (platform, task kind) to handler, fixed at construction.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(Platform, TaskKind), Arc<dyn PlatformHandler>>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for one (platform, kind) pair, replacing any previous one.
    pub fn register(
        &mut self,
        platform: Platform,
        kind: TaskKind,
        handler: Arc<dyn PlatformHandler>,
    ) {
        self.handlers.insert((platform, kind), handler);
    }

    /// Register `handler` for every task kind on `platform`.
    pub fn register_platform(&mut self, platform: Platform, handler: &Arc<dyn PlatformHandler>) {
        for kind in TaskKind::ALL {
            self.handlers.insert((platform, kind), Arc::clone(handler));
        }
    }

    /// Handler for (platform, kind), if registered.
    #[must_use]
    pub fn get(&self, platform: Platform, kind: TaskKind) -> Option<&Arc<dyn PlatformHandler>> {
        self.handlers.get(&(platform, kind))
    }

    /// Number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registered", &self.handlers.len())
            .finish()
    }
}
