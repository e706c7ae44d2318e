use super::{Awaitable, Awaiter};
use crate::{Coroutine, Exception};

/// Adapts an [`Awaitable`] into an [`Awaiter`] with no result.
///
/// Awaiting a `Ready` waits for the wrapped value to become satisfied
/// without consuming whatever it would produce.
#[derive(Debug, Clone)]
pub struct Ready<A>(A);

/// Waits for `awaitable` to become satisfied, discarding its result.
///
/// # Examples
///
/// ```rust,ignore
/// // Suspend until the task finishes, but leave its value in place.
/// if let Some(flow) = cx.await_on(DONE, coframe::ready(task.clone())) {
///     return Ok(flow);
/// }
/// ```
pub fn ready<A: Awaitable>(awaitable: A) -> Ready<A> {
    Ready(awaitable)
}

impl<A> Ready<A> {
    /// Returns the wrapped awaitable.
    pub fn into_inner(self) -> A {
        self.0
    }
}

impl<A: Awaitable> Awaitable for Ready<A> {
    fn ready(&mut self) -> bool {
        self.0.ready()
    }

    fn register(&mut self, coro: &mut Coroutine) -> bool {
        self.0.register(coro)
    }
}

impl<A: Awaitable> Awaiter for Ready<A> {
    type Output = ();

    fn resume(&mut self) -> Result<(), Exception> {
        Ok(())
    }
}
