//! Background task tracking for stale-while-revalidate refreshes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{Instrument, info_span};

/// Internal state shared across clones.
#[derive(Debug, Default)]
struct OffloadInner {
    tasks: DashMap<u64, JoinHandle<()>>,
    next_id: AtomicU64,
}

/// Tracker for tasks offloaded to background execution.
///
/// Every spawned task is registered until it completes, so callers (tests
/// above all) can observe and join in-flight refreshes instead of sleeping
/// and hoping. Cloning is cheap; clones share the registry.
#[derive(Clone, Debug, Default)]
pub struct Offload {
    inner: Arc<OffloadInner>,
}

impl Offload {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` onto the tokio runtime and tracks it to completion.
    ///
    /// The `kind` labels the task's tracing span.
    pub fn spawn<F>(&self, kind: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let span = info_span!("offload_task", kind, id);
        let handle = tokio::spawn(
            async move {
                task.await;
                inner.tasks.remove(&id);
            }
            .instrument(span),
        );
        self.inner.tasks.insert(id, handle);
    }

    /// Number of currently running tasks.
    pub fn active_task_count(&self) -> usize {
        self.inner.tasks.iter().filter(|e| !e.is_finished()).count()
    }

    /// Drops handles of finished tasks.
    pub fn cleanup_finished(&self) {
        self.inner.tasks.retain(|_, handle| !handle.is_finished());
    }

    /// Waits until every tracked task has completed.
    ///
    /// Polls with a yield between checks to let the tasks make progress.
    pub async fn wait_all(&self) {
        loop {
            self.cleanup_finished();
            if self.inner.tasks.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Waits for all tasks, up to `timeout`. Returns `false` on timeout.
    pub async fn wait_all_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_all()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn spawned_tasks_run_and_unregister() {
        let offload = Offload::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = Arc::clone(&done);
            offload.spawn("refresh", async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        offload.wait_all().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(offload.active_task_count(), 0);
    }

    #[tokio::test]
    async fn wait_all_timeout_reports_stragglers() {
        let offload = Offload::new();
        offload.spawn("refresh", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        assert!(!offload.wait_all_timeout(Duration::from_millis(20)).await);
    }
}
