use super::Task;
use super::state::{TAG_CANCELLED, TAG_EXCEPTION, TAG_NULL, TAG_VALUE};
use crate::awaiter::{Awaitable, Awaiter};
use crate::coroutine::frame::Header;
use crate::promise::{Promise, implicit_result};
use crate::step::{Body, Flow, Label, START, Step};
use crate::utils::atomic::{AtomicPtr, AtomicU8, AtomicUsize, Ordering, fence};
use crate::{Coroutine, Error, Exception};

use std::cell::UnsafeCell;
use std::fmt;
use std::ptr::{self, NonNull};

/// Completion state of a shared task.
///
/// `use_count` starts at 2: one reference for the first [`SharedTask`] and
/// one for the completion slot held by the producing promise. `then` is the
/// head of an intrusive list of parked continuations, linked through their
/// frame headers. It points at the state itself while the list is open and
/// is null once the list was drained.
struct SharedState<T> {
    use_count: AtomicUsize,
    tag: AtomicU8,
    then: AtomicPtr<Header>,
    result: UnsafeCell<Option<Result<T, Exception>>>,
}

impl<T> SharedState<T> {
    /// The "open list" marker: an address no frame can have.
    fn open(&self) -> *mut Header {
        (self as *const Self).cast_mut().cast()
    }

    fn is_ready(&self) -> bool {
        self.tag.load(Ordering::Acquire) != TAG_NULL
    }

    /// Stores the result and publishes it. Runs at most once, from the
    /// producer.
    fn publish(&self, result: Result<T, Exception>, tag: u8) {
        // Safety: readers only touch `result` after observing a non-null tag.
        unsafe { *self.result.get() = Some(result) };
        self.tag.store(tag, Ordering::Release);
    }

    /// Borrows the published result.
    fn get(&self) -> Option<Result<&T, &Exception>> {
        if !self.is_ready() {
            return None;
        }

        // Safety: the result never changes once published.
        unsafe { (*self.result.get()).as_ref().map(Result::as_ref) }
    }

    /// Prepends the continuation in `coro` to the pending list.
    ///
    /// Returns `true` (leaving `coro` empty) if the continuation will be
    /// resumed by [`finalize`](Self::finalize), and `false` (leaving it in
    /// `coro`) if the result is already published and the caller should
    /// continue synchronously.
    fn register(&self, coro: &mut Coroutine) -> bool {
        let Some(node) = coro.raw() else {
            panic!("registered an empty coroutine handle");
        };
        let node = node.as_ptr();

        let mut prev = self.then.load(Ordering::Acquire);

        while !prev.is_null() {
            // Safety: the frame is parked on this suspension point and only
            // this list will ever read its link.
            unsafe { *(*node).link.get() = prev };

            match self
                .then
                .compare_exchange_weak(prev, node, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    // Completion raced the prepend: take the node back out if
                    // the producer has not drained the list yet.
                    if self.tag.load(Ordering::Acquire) == TAG_NULL
                        || self
                            .then
                            .compare_exchange(node, prev, Ordering::AcqRel, Ordering::Acquire)
                            .is_err()
                    {
                        coro.detach();
                        return true;
                    }

                    return false;
                }
                Err(current) => prev = current,
            }
        }

        false
    }

    /// Closes the list and resumes every parked continuation, most recently
    /// registered first.
    fn finalize(&self) {
        let open = self.open();
        let mut next = self.then.swap(ptr::null_mut(), Ordering::AcqRel);

        if next.is_null() {
            return;
        }

        let mut resumed = 0usize;

        while next != open {
            // Safety: every node was a parked frame whose handle the list
            // took over; its link is read before it runs again.
            let header = unsafe { NonNull::new_unchecked(next) };
            next = unsafe { *header.as_ref().link.get() };

            let mut coro: Coroutine = unsafe { Coroutine::from_raw(header) };
            coro.run();
            resumed += 1;
        }

        tracing::trace!(resumed, "shared task broadcast");
    }
}

/// A counted reference to a [`SharedState`].
struct SharedRef<T> {
    ptr: NonNull<SharedState<T>>,
}

unsafe impl<T: Send + Sync> Send for SharedRef<T> {}
unsafe impl<T: Send + Sync> Sync for SharedRef<T> {}

impl<T> SharedRef<T> {
    /// Allocates a state and returns its two initial references: the
    /// consumer's and the completion slot's.
    fn pair() -> (Self, Self) {
        let state = Box::new(SharedState {
            use_count: AtomicUsize::new(2),
            tag: AtomicU8::new(TAG_NULL),
            then: AtomicPtr::new(ptr::null_mut()),
            result: UnsafeCell::new(None),
        });
        let ptr = NonNull::from(Box::leak(state));

        let state = unsafe { ptr.as_ref() };
        state.then.store(state.open(), Ordering::Relaxed);

        (Self { ptr }, Self { ptr })
    }

    fn state(&self) -> &SharedState<T> {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> Clone for SharedRef<T> {
    fn clone(&self) -> Self {
        // No data is read through the count.
        self.state().use_count.fetch_add(1, Ordering::Relaxed);
        Self { ptr: self.ptr }
    }
}

impl<T> Drop for SharedRef<T> {
    fn drop(&mut self) {
        if self.state().use_count.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }

        fence(Ordering::Acquire);
        tracing::trace!(state = ?self.ptr, "shared state released");

        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

/// Promise of coroutines that produce a [`SharedTask`].
///
/// Like [`TaskPromise`](super::TaskPromise) it starts eagerly and stores
/// errors instead of rethrowing them. On completion it broadcasts to every
/// consumer parked on the task. Once only its own completion slot still
/// references the shared state, nobody can observe the result any more and
/// the coroutine is cancelled at its next suspension point.
pub struct SharedPromise<T> {
    slot: SharedRef<T>,
    task: Option<SharedRef<T>>,
}

impl<T> SharedPromise<T> {
    pub fn new() -> Self {
        let (task, slot) = SharedRef::pair();

        Self {
            slot,
            task: Some(task),
        }
    }
}

impl<T> Default for SharedPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Promise for SharedPromise<T> {
    type Output = T;
    type Object = SharedTask<T>;

    fn get_return_object(mut coro: Coroutine<Self>) -> SharedTask<T> {
        let Some(shared) = coro.promise_mut().task.take() else {
            panic!("shared promise handed out its task twice");
        };

        coro.run();

        SharedTask { shared }
    }

    fn cancellation_requested(&self) -> bool {
        self.slot.state().use_count.load(Ordering::Relaxed) == 1
    }

    fn set_result(&mut self, value: T) {
        self.slot.state().publish(Ok(value), TAG_VALUE);
    }

    fn final_result(&mut self) -> Result<(), Exception> {
        let Some(unit) = implicit_result::<T>() else {
            return Err(Error::MissingReturn.into());
        };

        self.slot.state().publish(Ok(unit), TAG_VALUE);
        Ok(())
    }

    fn set_exception(&mut self, error: Exception) -> Result<(), Exception> {
        self.slot.state().publish(Err(error), TAG_EXCEPTION);
        Ok(())
    }

    fn cancel(&mut self) {
        self.slot
            .state()
            .publish(Err(Error::Cancelled.into()), TAG_CANCELLED);
    }

    fn final_suspend(&mut self) -> bool {
        let state = self.slot.state();

        if !state.is_ready() {
            state.publish(Err(Error::MissingReturn.into()), TAG_EXCEPTION);
        }

        state.finalize();
        false
    }
}

const JOINED: Label = 2;

/// Awaits a [`Task`] and forwards its outcome to a shared promise.
struct Forward<T> {
    task: Option<Task<T>>,
}

impl<T: Send + Sync + 'static> Body<SharedPromise<T>> for Forward<T> {
    fn resume(&mut self, cx: &mut Step<'_, SharedPromise<T>>) -> Result<Flow, Exception> {
        loop {
            match cx.label() {
                START => {
                    let Some(task) = self.task.take() else {
                        panic!("forwarding body started twice");
                    };

                    if let Some(flow) = cx.await_on(JOINED, task) {
                        return Ok(flow);
                    }
                }
                JOINED => {
                    let value = cx.take::<Task<T>>()?;
                    return cx.ret(value);
                }
                label => panic!("forwarding body resumed at unknown label {label}"),
            }
        }
    }
}

/// A multi-consumer future.
///
/// Cloning a `SharedTask` is cheap and every clone observes the same
/// outcome. Any number of coroutines may await clones concurrently; when the
/// producer completes, the parked ones are resumed most recently registered
/// first, and those awaiting after completion continue without suspending.
/// Each consumer receives a clone of the value, or of the error.
///
/// The shared state is freed when the last clone and the producer are both
/// gone.
pub struct SharedTask<T> {
    shared: SharedRef<T>,
}

impl<T> SharedTask<T> {
    /// Returns `true` if the outcome is published.
    pub fn is_ready(&self) -> bool {
        self.shared.state().is_ready()
    }

    /// Borrows the outcome, if published.
    pub fn get(&self) -> Option<Result<&T, &Exception>> {
        self.shared.state().get()
    }

    /// Number of live references to the shared state, including the
    /// producer's completion slot while it runs.
    pub fn use_count(&self) -> usize {
        self.shared.state().use_count.load(Ordering::Relaxed)
    }
}

impl<T: Send + Sync + 'static> From<Task<T>> for SharedTask<T> {
    fn from(task: Task<T>) -> Self {
        crate::create(SharedPromise::new(), Forward { task: Some(task) })
    }
}

impl<T> Clone for SharedTask<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Awaitable for SharedTask<T> {
    fn ready(&mut self) -> bool {
        self.is_ready()
    }

    fn register(&mut self, coro: &mut Coroutine) -> bool {
        self.shared.state().register(coro)
    }
}

impl<T: Clone> Awaiter for SharedTask<T> {
    type Output = T;

    /// Clones the value, or rethrows a clone of the error.
    fn resume(&mut self) -> Result<T, Exception> {
        match self.get() {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(error)) => Err(error.clone()),
            None => panic!("shared task result extracted before completion"),
        }
    }
}

impl<T> fmt::Debug for SharedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTask")
            .field("ready", &self.is_ready())
            .field("use_count", &self.use_count())
            .finish()
    }
}
