use crate::error::CompletionError;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Shared count of connections that have not yet closed.
///
/// Sized to the number of connections in the run and decremented once per connection by its
/// benchmark handler. The orchestrator waits on [`CompletionCounter::wait`] to learn that the
/// whole run has finished.
#[derive(Debug)]
pub struct CompletionCounter {
    remaining: AtomicUsize,
    total: usize,
    done: Notify,
}

impl CompletionCounter {
    pub fn new(total: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(total),
            total,
            done: Notify::new(),
        }
    }

    /// Decrements the count, returning how many connections remain.
    ///
    /// Never goes below zero: a decrement at zero is rejected and leaves the count untouched.
    pub fn count_down(&self) -> Result<usize, CompletionError> {
        let prev = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map_err(|_| CompletionError::Underflow)?;

        let remaining = prev - 1;
        #[cfg(feature = "metrics")]
        metrics::gauge!("cushion.connections.remaining").set(remaining as f64);

        if remaining == 0 {
            debug!("All {} connections closed.", self.total);
            self.done.notify_waiters();
        }
        Ok(remaining)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Resolves once the count reaches zero.
    pub async fn wait(&self) {
        loop {
            // Registered before the check so a concurrent final decrement cannot be missed.
            let notified = self.done.notified();
            if self.is_done() {
                return;
            }
            notified.await;
        }
    }
}
