use super::SharedTask;
use super::core::TaskCore;
use crate::awaiter::{Awaitable, Awaiter};
use crate::{Coroutine, Exception};

use std::fmt;
use std::sync::Arc;

/// A single-consumer future produced by a coroutine running a
/// [`TaskPromise`](super::TaskPromise).
///
/// A `Task` is move-only and can be awaited exactly once: awaiting it parks
/// the awaiting coroutine until the producer completes, then hands over the
/// produced value or rethrows the produced error.
///
/// Dropping a `Task` before it completes requests cancellation; the producer
/// observes it the next time it is resumed at a suspension point and takes
/// its cleanup path.
pub struct Task<T> {
    /// State shared with the producing promise.
    pub(crate) core: Arc<TaskCore<T>>,
}

impl<T: Send + 'static> Task<T> {
    /// A task that is already completed with `value`.
    pub fn from_value(value: T) -> Self {
        Self {
            core: Arc::new(TaskCore::completed(Ok(value))),
        }
    }

    /// A task that is already completed with `error`.
    pub fn from_exception(error: impl Into<Exception>) -> Self {
        Self {
            core: Arc::new(TaskCore::completed(Err(error.into()))),
        }
    }

    /// Returns `true` if the result is available.
    pub fn is_ready(&self) -> bool {
        self.core.is_completed()
    }

    /// Takes the result without awaiting, if the task has completed.
    ///
    /// Once taken, later extractions report
    /// [`Error::ResultTaken`](crate::Error::ResultTaken).
    pub fn try_take(&mut self) -> Option<Result<T, Exception>> {
        self.is_ready().then(|| self.core.take())
    }

    /// Converts the task into a [`SharedTask`] any number of consumers can
    /// await.
    pub fn share(self) -> SharedTask<T>
    where
        T: Sync,
    {
        SharedTask::from(self)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if !self.core.is_completed() {
            tracing::trace!("task dropped before completion, requesting cancellation");
            self.core.request_cancel();
        }
    }
}

impl<T> Awaitable for Task<T> {
    fn ready(&mut self) -> bool {
        self.core.is_completed()
    }

    fn register(&mut self, coro: &mut Coroutine) -> bool {
        self.core.register(coro)
    }
}

impl<T> Awaiter for Task<T> {
    type Output = T;

    /// Takes the result, rethrowing the producer's error.
    fn resume(&mut self) -> Result<T, Exception> {
        self.core.take()
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("ready", &self.core.is_completed())
            .finish()
    }
}
