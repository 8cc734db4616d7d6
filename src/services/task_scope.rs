//! Background tasks that share one shutdown signal.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Spawns tasks on a runtime and cancels all of them on [`TaskScope::shutdown`].
///
/// Completion observers, retry delays and the connection loops of a cache
/// all run inside its scope.
#[derive(Clone)]
pub struct TaskScope {
    runtime: Handle,
    shutdown: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for TaskScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScope")
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

impl TaskScope {
    /// Scope spawning on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            runtime,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Scope on the runtime this is called from.
    ///
    /// # Panics
    /// Outside of a Tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Spawn `future`; it resolves to `None` if the scope shut down first.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let stopped = wait_for_shutdown(self.shutdown.subscribe());
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                () = stopped => None,
                output = future => Some(output),
            }
        })
    }

    /// Cancel every task spawned in this scope, now and later.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Whether `shutdown` has been called.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stopped| *stopped).await.is_err() {
        // Scope dropped without shutting down: keep the task running.
        futures::future::pending::<()>().await;
    }
}
