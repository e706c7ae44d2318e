use super::alloc::{FrameAlloc, Global};
use super::frame::Frame;
use crate::awaiter::DEFAULT_SCRATCH;
use crate::promise::Promise;
use crate::step::Body;
use crate::Error;

use std::alloc::handle_alloc_error;

/// Builder for configuring and creating coroutines.
///
/// `Builder` selects the frame allocator and the inline scratch budget used
/// for awaiters before the frame is created. Both are fixed for the lifetime
/// of the frame.
///
/// # Examples
///
/// ```rust,ignore
/// let task: Task<i32> = Builder::new()
///     .allocator(arena.clone())
///     .scratch::<64>()
///     .create(TaskPromise::default(), Compute::new(21));
/// ```
#[derive(Debug, Clone)]
pub struct Builder<A = Global, const N: usize = DEFAULT_SCRATCH> {
    /// Allocator the frame is created with and returned to.
    alloc: A,
}

impl Builder {
    /// Creates a new `Builder` with the global allocator and the default
    /// scratch budget.
    pub fn new() -> Self {
        Self { alloc: Global }
    }
}

impl<A: FrameAlloc, const N: usize> Builder<A, N> {
    /// Sets the allocator used for the frame.
    pub fn allocator<B: FrameAlloc>(self, alloc: B) -> Builder<B, N> {
        Builder { alloc }
    }

    /// Sets the inline scratch budget, in bytes.
    ///
    /// Awaiters larger than the budget are boxed. Budgets smaller than a
    /// pointer fail to compile.
    pub fn scratch<const M: usize>(self) -> Builder<A, M> {
        Builder { alloc: self.alloc }
    }

    /// Creates the coroutine and hands it to its promise.
    ///
    /// Returns whatever [`Promise::get_return_object`] builds, which for
    /// eager promises means the body already ran up to its first suspension.
    pub fn try_create<P, F>(self, promise: P, body: F) -> Result<P::Object, Error>
    where
        P: Promise,
        F: Body<P>,
    {
        let coro = Frame::<P, F, A, N>::create(self.alloc, promise, body)?;
        Ok(P::get_return_object(coro))
    }

    /// Creates the coroutine and hands it to its promise.
    ///
    /// # Panics
    ///
    /// Aborts through [`handle_alloc_error`] if the allocator fails.
    pub fn create<P, F>(self, promise: P, body: F) -> P::Object
    where
        P: Promise,
        F: Body<P>,
    {
        match self.try_create(promise, body) {
            Ok(object) => object,
            Err(Error::AllocFailed(layout)) => handle_alloc_error(layout),
            Err(error) => unreachable!("frame creation failed: {error}"),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a coroutine with the default configuration.
///
/// # Examples
///
/// ```rust,ignore
/// let coro = coframe::create(BasicPromise, Countdown { left: 3 })?;
/// ```
pub fn create<P, F>(promise: P, body: F) -> P::Object
where
    P: Promise,
    F: Body<P>,
{
    Builder::new().create(promise, body)
}

/// Fallible form of [`create`].
pub fn try_create<P, F>(promise: P, body: F) -> Result<P::Object, Error>
where
    P: Promise,
    F: Body<P>,
{
    Builder::new().try_create(promise, body)
}
