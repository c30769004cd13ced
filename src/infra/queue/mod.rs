//! Queue backends.

pub mod memory;

pub use memory::{PlatformQueue, QueueSet, DEFAULT_QUEUE_CAPACITY};
