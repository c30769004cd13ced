//! In-memory bounded platform queues.
//!
//! Each queue is a bounded multi-producer/multi-consumer FIFO channel. A full
//! queue suspends producers instead of rejecting them; this is the only
//! backpressure in the system.

use std::sync::Arc;

use flume::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::task::{Platform, Task};
use crate::core::DispatchError;

/// Default number of tasks a platform queue holds before producers block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Bounded FIFO mailbox of tasks for one platform.
pub struct PlatformQueue {
    platform: Platform,
    capacity: usize,
    /// Producer handle. `None` once closed; dropping it lets consumers observe end-of-stream.
    tx: Mutex<Option<Sender<Task>>>,
    rx: Receiver<Task>,
    /// Wakes producers suspended on a full queue when the queue closes.
    closed: CancellationToken,
}

impl PlatformQueue {
    /// Create an open queue holding at most `capacity` tasks.
    #[must_use]
    pub fn new(platform: Platform, capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self {
            platform,
            capacity,
            tx: Mutex::new(Some(tx)),
            rx,
            closed: CancellationToken::new(),
        }
    }

    fn sender(&self) -> Result<Sender<Task>, DispatchError> {
        self.tx
            .lock()
            .clone()
            .ok_or(DispatchError::QueueClosed(self.platform))
    }

    /// Enqueue a task, suspending while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::QueueClosed` if the queue is closed before or
    /// while waiting for space.
    pub async fn enqueue(&self, task: Task) -> Result<(), DispatchError> {
        let tx = self.sender()?;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(DispatchError::QueueClosed(self.platform)),
            sent = tx.send_async(task) => {
                sent.map_err(|_| DispatchError::QueueClosed(self.platform))
            }
        }
    }

    /// Enqueue a task, blocking the calling thread while the queue is full.
    ///
    /// Do not call from inside an async task; use [`PlatformQueue::enqueue`].
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::QueueClosed` if the queue is closed.
    pub fn enqueue_blocking(&self, task: Task) -> Result<(), DispatchError> {
        futures::executor::block_on(self.enqueue(task))
    }

    /// Enqueue without waiting.
    ///
    /// # Errors
    ///
    /// - `DispatchError::QueueFull` if the queue is at capacity
    /// - `DispatchError::QueueClosed` if the queue is closed
    pub fn try_enqueue(&self, task: Task) -> Result<(), DispatchError> {
        let tx = self.sender()?;
        tx.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::QueueFull(self.platform),
            TrySendError::Disconnected(_) => DispatchError::QueueClosed(self.platform),
        })
    }

    /// Wait for the next task. Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<Task> {
        self.rx.recv_async().await.ok()
    }

    /// Take the next task if one is ready.
    #[must_use]
    pub fn try_dequeue(&self) -> Option<Task> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting tasks. Already queued tasks stay available to consumers.
    pub fn close(&self) {
        self.closed.cancel();
        self.tx.lock().take();
    }

    /// Whether [`PlatformQueue::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Tasks currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no task is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of waiting tasks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Platform this queue serves.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }
}

/// One queue per platform, created once and never recreated.
pub struct QueueSet {
    queues: [Arc<PlatformQueue>; Platform::COUNT],
}

impl QueueSet {
    /// Create a queue for every platform.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: Platform::ALL.map(|p| Arc::new(PlatformQueue::new(p, capacity))),
        }
    }

    /// Queue for `platform`.
    #[must_use]
    pub fn get(&self, platform: Platform) -> &Arc<PlatformQueue> {
        &self.queues[platform as usize]
    }

    /// Close every queue.
    pub fn close_all(&self) {
        for queue in &self.queues {
            queue.close();
        }
    }

    /// Iterate over all queues in platform order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PlatformQueue>> {
        self.queues.iter()
    }
}
