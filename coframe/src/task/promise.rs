use super::Task;
use super::core::TaskCore;
use crate::promise::{Promise, implicit_result};
use crate::{Coroutine, Error, Exception};

use std::sync::Arc;

/// Promise of coroutines that produce a [`Task`].
///
/// The coroutine starts eagerly: creating it runs the body up to its first
/// suspension before the task is handed back. Errors escaping the body are
/// stored and rethrown to the consumer, never to the resumer.
pub struct TaskPromise<T> {
    core: Arc<TaskCore<T>>,
    outcome: Option<Result<T, Exception>>,
}

impl<T> TaskPromise<T> {
    pub fn new() -> Self {
        Self {
            core: Arc::new(TaskCore::new()),
            outcome: None,
        }
    }
}

impl<T> Default for TaskPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Promise for TaskPromise<T> {
    type Output = T;
    type Object = Task<T>;

    /// Runs the body until it first suspends.
    ///
    /// A body that parks without handing its handle to an awaiter cannot be
    /// resumed by anyone afterwards, so it is unwound and the task completes
    /// as cancelled.
    fn get_return_object(mut coro: Coroutine<Self>) -> Task<T> {
        let core = coro.promise().core.clone();

        coro.run();

        if !coro.is_empty() {
            tracing::trace!(frame = ?coro, "task body parked without a waker, unwinding");
        }

        Task { core }
    }

    fn cancellation_requested(&self) -> bool {
        self.core.is_cancelled()
    }

    fn set_result(&mut self, value: T) {
        self.outcome = Some(Ok(value));
    }

    /// Accepts falling off the end of a `Task<()>` body.
    fn final_result(&mut self) -> Result<(), Exception> {
        let Some(unit) = implicit_result::<T>() else {
            return Err(Error::MissingReturn.into());
        };

        self.outcome = Some(Ok(unit));
        Ok(())
    }

    fn set_exception(&mut self, error: Exception) -> Result<(), Exception> {
        self.outcome = Some(Err(error));
        Ok(())
    }

    fn cancel(&mut self) {
        self.outcome = Some(Err(Error::Cancelled.into()));
    }

    fn final_suspend(&mut self) -> bool {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| Err(Error::MissingReturn.into()));

        self.core.complete(outcome);
        false
    }
}
