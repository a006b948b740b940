use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::DispatchConfig;

/// Shared worker pool backing a broker.
///
/// Tasks are spawned on the runtime captured at construction; the semaphore
/// bounds how many operator invocations run at once across all subscriptions.
pub(crate) struct Dispatcher {
    runtime: Handle,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub(crate) fn new(config: DispatchConfig, runtime: Handle) -> Self {
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(config.workers())),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    pub(crate) fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.permits)
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn a tracked task; finished handles are collected first
    pub(crate) fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(fut);
        let mut tasks = self.tasks();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Drop handles of tasks that already completed, returning how many were removed
    pub(crate) fn collect_finished(&self) -> usize {
        let mut tasks = self.tasks();
        let before = tasks.len();
        tasks.retain(|h| !h.is_finished());
        before - tasks.len()
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.tasks().len()
    }

    /// Refuse new work. Returns false if shutdown had already begun.
    pub(crate) fn begin_shutdown(&self) -> bool {
        let first = self.is_alive();
        self.shutdown.cancel();
        first
    }

    /// Wait for every tracked task to finish
    pub(crate) async fn join_all(&self) {
        let handles: Vec<JoinHandle<()>> = self.tasks().drain(..).collect();
        debug!(tasks = handles.len(), "Waiting for dispatcher tasks");

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Dispatcher task ended abnormally");
            }
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn dispatcher(workers: usize) -> Dispatcher {
        Dispatcher::new(
            DispatchConfig::default().with_workers(workers),
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn join_all_waits_for_spawned_tasks() {
        let dispatcher = dispatcher(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            dispatcher.spawn(async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(dispatcher.begin_shutdown());
        dispatcher.join_all().await;

        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(dispatcher.tracked(), 0);
    }

    #[tokio::test]
    async fn finished_handles_are_collected() {
        let dispatcher = dispatcher(1);
        let (tx, rx) = oneshot::channel::<()>();

        dispatcher.spawn(async {});
        dispatcher.spawn(async move {
            let _ = rx.await;
        });

        // Give the first task a chance to complete
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        assert_eq!(dispatcher.collect_finished(), 1);
        assert_eq!(dispatcher.tracked(), 1);

        tx.send(()).unwrap();
        dispatcher.join_all().await;
    }

    #[tokio::test]
    async fn shutdown_is_reported_once() {
        let dispatcher = dispatcher(1);
        assert!(dispatcher.is_alive());
        assert!(dispatcher.begin_shutdown());
        assert!(!dispatcher.begin_shutdown());
        assert!(!dispatcher.is_alive());
    }
}
