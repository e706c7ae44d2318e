use super::state::{COMPLETED, PENDING, WAITING};
use crate::utils::atomic::{AtomicBool, AtomicUsize, Ordering};
use crate::{Coroutine, Error, Exception};

use std::cell::UnsafeCell;

/// State shared between a [`Task`](super::Task) and the promise of the
/// coroutine producing its result.
///
/// The producer writes `result` exactly once and then publishes it through
/// `state`; the single consumer either finds it `COMPLETED` or parks its
/// continuation in `then` and flips the state to `WAITING`, in which case the
/// producer resumes it.
pub(crate) struct TaskCore<T> {
    /// Lifecycle state (PENDING, WAITING, COMPLETED).
    state: AtomicUsize,

    /// Set when the consumer gave up on the result.
    cancelled: AtomicBool,

    /// The produced value or error, until the consumer takes it.
    result: UnsafeCell<Option<Result<T, Exception>>>,

    /// The consumer's continuation, while it waits.
    then: UnsafeCell<Coroutine>,
}

unsafe impl<T: Send> Send for TaskCore<T> {}
unsafe impl<T: Send> Sync for TaskCore<T> {}

impl<T> TaskCore<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicUsize::new(PENDING),
            cancelled: AtomicBool::new(false),
            result: UnsafeCell::new(None),
            then: UnsafeCell::new(Coroutine::empty()),
        }
    }

    /// A core that is already completed with `result`.
    pub(crate) fn completed(result: Result<T, Exception>) -> Self {
        Self {
            state: AtomicUsize::new(COMPLETED),
            cancelled: AtomicBool::new(false),
            result: UnsafeCell::new(Some(result)),
            then: UnsafeCell::new(Coroutine::empty()),
        }
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMPLETED
    }

    pub(crate) fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Parks the consumer's continuation.
    ///
    /// Returns `false`, leaving the handle in `coro`, if the task completed
    /// in the meantime.
    ///
    /// # Panics
    ///
    /// Panics if another consumer is already waiting.
    pub(crate) fn register(&self, coro: &mut Coroutine) -> bool {
        if self.state.load(Ordering::Acquire) == WAITING {
            panic!("a task can only be awaited by one consumer");
        }

        // Safety: until the state becomes WAITING only the consumer touches
        // `then`.
        unsafe { *self.then.get() = coro.take() };

        match self
            .state
            .compare_exchange(PENDING, WAITING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(COMPLETED) => {
                // The producer saw PENDING and never looked at `then`.
                *coro = unsafe { (*self.then.get()).take() };
                false
            }
            Err(_) => panic!("a task can only be awaited by one consumer"),
        }
    }

    /// Publishes the result and wakes the consumer if it is waiting.
    pub(crate) fn complete(&self, result: Result<T, Exception>) {
        // Safety: the consumer reads `result` only after observing COMPLETED.
        unsafe { *self.result.get() = Some(result) };

        if self.state.swap(COMPLETED, Ordering::AcqRel) == WAITING {
            // Safety: WAITING means the consumer finished writing `then` and
            // will not touch it again.
            let mut then = unsafe { (*self.then.get()).take() };

            tracing::trace!(consumer = ?then, "task completed, resuming consumer");
            then.run();
        }
    }

    /// Takes the result out of a completed core.
    ///
    /// # Panics
    ///
    /// Panics if the task has not completed.
    pub(crate) fn take(&self) -> Result<T, Exception> {
        assert!(self.is_completed(), "task result extracted before completion");

        // Safety: COMPLETED is final and the single consumer is the only
        // reader.
        match unsafe { (*self.result.get()).take() } {
            Some(result) => result,
            None => Err(Error::ResultTaken.into()),
        }
    }
}
