//! The three-phase suspension protocol.
//!
//! Anything a coroutine can suspend on implements [`Awaitable`] (the
//! "is it satisfied" and "register a continuation" phases) and usually
//! [`Awaiter`] (the "extract the result" phase). The awaited value lives in
//! the frame's scratch storage for the duration of the suspension.

mod ready;
pub(crate) mod scratch;
mod suspend;

pub use ready::{Ready, ready};
pub use scratch::DEFAULT_SCRATCH;
pub use suspend::{Suspend, SuspendAlways, SuspendNever};

use crate::{Coroutine, Exception};

/// The readiness and registration phases of the suspension protocol.
pub trait Awaitable {
    /// Returns `true` if the awaited event already happened, in which case
    /// the coroutine continues without suspending.
    fn ready(&mut self) -> bool;

    /// Registers the suspending coroutine as the continuation.
    ///
    /// An implementation that wants to be woken takes the handle out of
    /// `coro` (leaving it empty) and resumes it once the event happens.
    ///
    /// Returns `true` if the coroutine is now suspended, meaning the current
    /// resumption ends here, and `false` if the event happened in the
    /// meantime and the coroutine should continue synchronously. An
    /// implementation returning `false` must leave the handle in `coro`.
    fn register(&mut self, coro: &mut Coroutine) -> bool;
}

/// An [`Awaitable`] that also produces a result once satisfied.
pub trait Awaiter: Awaitable {
    /// The value handed back to the coroutine.
    type Output;

    /// Extracts the result, or rethrows the stored failure.
    fn resume(&mut self) -> Result<Self::Output, Exception>;
}

impl<A: Awaitable + ?Sized> Awaitable for &mut A {
    fn ready(&mut self) -> bool {
        (**self).ready()
    }

    fn register(&mut self, coro: &mut Coroutine) -> bool {
        (**self).register(coro)
    }
}

impl<A: Awaiter + ?Sized> Awaiter for &mut A {
    type Output = A::Output;

    fn resume(&mut self) -> Result<A::Output, Exception> {
        (**self).resume()
    }
}

impl<A: Awaitable + ?Sized> Awaitable for Box<A> {
    fn ready(&mut self) -> bool {
        (**self).ready()
    }

    fn register(&mut self, coro: &mut Coroutine) -> bool {
        (**self).register(coro)
    }
}

impl<A: Awaiter + ?Sized> Awaiter for Box<A> {
    type Output = A::Output;

    fn resume(&mut self) -> Result<A::Output, Exception> {
        (**self).resume()
    }
}
