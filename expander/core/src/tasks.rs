//! Handler Task Group
//!
//! Event listeners are synchronous, but tracker handlers await gateway
//! calls. Each handler invocation is spawned into a [`HandlerTasks`] group
//! owned by the plugin, which scopes the work to the plugin's active
//! lifetime:
//!
//! - [`HandlerTasks::settle`] waits until every spawned handler has finished
//! - [`HandlerTasks::abort_all`] cancels whatever is still in flight
//!
//! Finished tasks are reaped on every spawn so the set does not grow with
//! the number of events seen.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;

/// Task group for in-flight handler invocations
#[derive(Clone, Default)]
pub struct HandlerTasks {
    inner: Arc<Mutex<JoinSet<()>>>,
}

impl HandlerTasks {
    /// Create an empty group
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a handler future onto the current runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.inner.lock();
        while let Some(finished) = set.try_join_next() {
            log_join_result(finished);
        }
        set.spawn(task);
    }

    /// Number of handlers not yet reaped
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.lock().len()
    }

    /// Wait until every spawned handler (including ones spawned meanwhile)
    /// has finished
    pub async fn settle(&self) {
        loop {
            let mut set = std::mem::take(&mut *self.inner.lock());
            if set.is_empty() {
                return;
            }
            while let Some(finished) = set.join_next().await {
                log_join_result(finished);
            }
        }
    }

    /// Cancel every in-flight handler
    ///
    /// Returns how many tasks were still registered. Requests already handed
    /// to the host may still take effect there.
    pub fn abort_all(&self) -> usize {
        let set = std::mem::take(&mut *self.inner.lock());
        let count = set.len();
        // Dropping a JoinSet aborts everything in it
        drop(set);
        count
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Handler task panicked");
        } else {
            tracing::debug!(error = %e, "Handler task cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_for_all_tasks() {
        let tasks = HandlerTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for delay in [10, 50, 100] {
            let done = Arc::clone(&done);
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_includes_nested_spawns() {
        let tasks = HandlerTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_tasks = tasks.clone();
        let inner_done = Arc::clone(&done);
        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            inner_tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                inner_done.fetch_add(1, Ordering::SeqCst);
            });
        });

        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_all_cancels_pending_work() {
        let tasks = HandlerTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        let task_done = Arc::clone(&done);
        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            task_done.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(tasks.abort_all(), 1);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(tasks.in_flight(), 0);
    }
}
