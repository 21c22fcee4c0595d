//! Composable asynchronous computations.
//!
//! A [`Task`] is a handle to a computation already scheduled on a
//! [`TaskExecutor`]. Continuations are registered with the `then_*_async`
//! combinators and [`all_of`]; none of them block a worker while waiting.
//! A failure skips every downstream stage and reaches the final observer
//! unchanged.

mod executor;

pub use executor::{CancelToken, TaskExecutor};

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};

/// Handle to a pending or completed computation.
#[must_use = "a task does nothing observable unless joined or chained"]
pub struct Task<T> {
    handle: JoinHandle<AppResult<T>>,
    executor: TaskExecutor,
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn from_handle(handle: JoinHandle<AppResult<T>>, executor: TaskExecutor) -> Self {
        Self { handle, executor }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the result. Dropping the returned future detaches the task
    /// instead of stopping it.
    pub async fn join(self) -> AppResult<T> {
        self.handle.await?
    }

    /// `thenApplyAsync`: run `transform` on the worker pool once this task
    /// succeeds.
    pub fn then_apply_async<U, F>(self, transform: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> AppResult<U> + Send + 'static,
    {
        let executor = self.executor.clone();
        let pool = executor.clone();
        executor.spawn(async move {
            let value = self.join().await?;
            pool.run_blocking(move || transform(value)).await
        })
    }

    /// `thenComposeAsync`: `f` builds the next task from this task's result;
    /// the returned task completes when that one does.
    pub fn then_compose_async<U, F>(self, f: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> AppResult<Task<U>> + Send + 'static,
    {
        let executor = self.executor.clone();
        let cancel = executor.cancel_token();
        executor.spawn(async move {
            let value = self.join().await?;
            cancel.check()?;
            f(value)?.join().await
        })
    }
}

/// `allOf`: succeed with every result in argument order, or fail with the
/// first failure observed. Siblings still running at that point are left to
/// finish on their own and their results are discarded.
pub fn all_of<T: Send + 'static>(executor: &TaskExecutor, tasks: Vec<Task<T>>) -> Task<Vec<T>> {
    let cancel = executor.cancel_token();
    executor.spawn(async move {
        cancel.check()?;

        let count = tasks.len();
        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| async move { (index, task.join().await) })
            .collect();

        let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
        while let Some((index, result)) = pending.next().await {
            slots[index] = Some(result?);
        }

        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| AppError::Task("allOf lost a result".to_string())))
            .collect()
    })
}
