//! Dedicated OS threads with their own single-threaded Tokio runtime.
//!
//! Workers, the result aggregator and the stats reporter each run on such a
//! thread so handler work never competes with the caller's runtime.

use std::future::Future;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error};

use crate::core::DispatchError;

/// Default stack size for dispatch threads.
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// How a deadline-bounded join ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The thread exited normally.
    Joined,
    /// The thread panicked.
    Panicked,
    /// The thread was still running at the deadline and has been detached.
    TimedOut,
}

/// Spawn a named thread that drives the future built by `make` to completion
/// on a fresh current-thread runtime.
///
/// # Errors
///
/// Returns `DispatchError::Spawn` if the OS refuses to create the thread.
pub fn spawn_runtime_thread<F, Fut>(
    name: String,
    stack_size: usize,
    make: F,
) -> Result<JoinHandle<()>, DispatchError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let thread_name = name.clone();
    thread::Builder::new()
        .name(name.clone())
        .stack_size(stack_size)
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(thread = %thread_name, error = %e, "Failed to create thread runtime");
                    return;
                }
            };
            rt.block_on(make());
            debug!(thread = %thread_name, "Runtime thread exiting");
        })
        .map_err(|source| DispatchError::Spawn { name, source })
}

/// Join `handle`, giving up at `deadline`.
///
/// A thread still running at the deadline is detached, not killed.
pub fn join_with_deadline(handle: JoinHandle<()>, deadline: Instant) -> JoinOutcome {
    if handle.is_finished() {
        return outcome(handle.join());
    }

    let (tx, rx) = mpsc::channel();
    let joiner = thread::spawn(move || {
        let _ = tx.send(handle.join().is_ok());
    });

    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(ok) => {
            let _ = joiner.join();
            if ok {
                JoinOutcome::Joined
            } else {
                JoinOutcome::Panicked
            }
        }
        // The joiner thread stays parked on the straggler and exits with it.
        Err(_) => JoinOutcome::TimedOut,
    }
}

fn outcome(result: thread::Result<()>) -> JoinOutcome {
    if result.is_ok() {
        JoinOutcome::Joined
    } else {
        JoinOutcome::Panicked
    }
}
