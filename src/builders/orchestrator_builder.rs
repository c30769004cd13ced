//! Builder wiring configuration, platform handlers and sinks into an [`Orchestrator`].

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::core::error::DispatchError;
use crate::core::handler::{HandlerRegistry, PlatformHandler};
use crate::core::orchestrator::Orchestrator;
use crate::core::task::{Platform, TaskKind};
use crate::infra::notify::NotificationSink;

/// Collects handlers and sinks, then validates the configuration in [`build`](Self::build).
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    handlers: HandlerRegistry,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl OrchestratorBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::new(),
            sinks: Vec::new(),
        }
    }

    /// Handle `kind` tasks on `platform` with `handler`, replacing any previous one.
    #[must_use]
    pub fn handler(
        mut self,
        platform: Platform,
        kind: TaskKind,
        handler: Arc<dyn PlatformHandler>,
    ) -> Self {
        self.handlers.register(platform, kind, handler);
        self
    }

    /// Handle every task kind on `platform` with `handler`.
    #[must_use]
    pub fn handler_for_all_kinds(
        mut self,
        platform: Platform,
        handler: Arc<dyn PlatformHandler>,
    ) -> Self {
        self.handlers.register_platform(platform, &handler);
        self
    }

    /// Replace the whole handler table.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Append a notification sink. Sinks are notified in the order added.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Validate the configuration and build an idle orchestrator.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidConfig` when validation fails.
    pub fn build(self) -> Result<Orchestrator, DispatchError> {
        self.config.validate().map_err(DispatchError::InvalidConfig)?;
        if self.handlers.is_empty() {
            tracing::warn!("Building orchestrator without platform handlers");
        }
        Ok(Orchestrator::new(self.config, self.handlers, self.sinks))
    }
}
