//! Infrastructure adapters: platform queues and notification sinks.

pub mod notify;
pub mod queue;

pub use notify::{InMemorySink, NotificationSink, TracingSink};
pub use queue::{PlatformQueue, QueueSet};
