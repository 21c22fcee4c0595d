use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::Task;
use crate::error::{AppError, AppResult};

/// Cooperative cancellation flag for one chain of stages.
///
/// A child token observes its parent's cancellation, but cancelling a child
/// leaves the parent and its other children running.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|parent| parent.is_cancelled())
    }

    /// Fails with `AppError::Cancelled` once `cancel` has been called.
    pub fn check(&self) -> AppResult<()> {
        if self.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Bounded worker pool that runs task-engine computations.
///
/// Async stages run as tokio tasks; synchronous computations run on the
/// blocking thread pool while holding one of `max_workers` permits. A stage
/// waiting on its antecedent holds no permit.
///
/// Each handle carries the cancel token inherited by the tasks it creates.
/// [`TaskExecutor::scope`] returns a handle on the same pool with its own
/// child token, so one chain can be cancelled without touching the others.
#[derive(Clone)]
pub struct TaskExecutor {
    runtime: Handle,
    permits: Arc<Semaphore>,
    max_workers: usize,
    cancel: CancelToken,
}

impl TaskExecutor {
    /// Create an executor on the current tokio runtime.
    ///
    /// Panics when called outside of a runtime, like `tokio::spawn`.
    pub fn new(max_workers: usize) -> Self {
        Self::with_handle(Handle::current(), max_workers)
    }

    pub fn with_handle(runtime: Handle, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        debug!("Task executor started with {} workers", max_workers);
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            cancel: CancelToken::new(),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Same pool, tasks bound to `cancel`.
    pub fn with_cancel(&self, cancel: CancelToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    /// Same pool, tasks bound to a fresh child of this handle's token.
    pub fn scope(&self) -> Self {
        self.with_cancel(self.cancel.child())
    }

    /// Stop starting new stages and retries for this handle and its scopes.
    /// In-flight work runs to completion.
    pub fn cancel(&self) {
        debug!("Task executor cancelled");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Schedule an async computation.
    pub fn spawn<T, Fut>(&self, future: Fut) -> Task<T>
    where
        T: Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        Task::from_handle(self.runtime.spawn(future), self.clone())
    }

    /// A task that is already resolved with `value`.
    pub fn completed<T: Send + 'static>(&self, value: T) -> Task<T> {
        self.spawn(async move { Ok(value) })
    }

    /// A task that is already failed with `error`.
    pub fn failed<T: Send + 'static>(&self, error: AppError) -> Task<T> {
        self.spawn(async move { Err(error) })
    }

    /// `supplyAsync`: run `f` on the worker pool and return a pending handle.
    pub fn supply_async<T, F>(&self, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce() -> AppResult<T> + Send + 'static,
    {
        let pool = self.clone();
        self.spawn(async move { pool.run_blocking(f).await })
    }

    /// `composeAsync`: `f` builds another task; the returned task completes with it.
    pub fn compose_async<T, F>(&self, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce() -> AppResult<Task<T>> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        self.spawn(async move {
            cancel.check()?;
            f()?.join().await
        })
    }

    /// Run a synchronous stage while holding a worker permit.
    pub(crate) async fn run_blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> AppResult<T> + Send + 'static,
    {
        self.cancel.check()?;
        let _permit = self.acquire().await?;
        tokio::task::spawn_blocking(f).await?
    }

    async fn acquire(&self) -> AppResult<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Task("worker pool is closed".to_string()))
    }
}
