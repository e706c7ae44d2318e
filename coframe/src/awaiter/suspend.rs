use super::{Awaitable, Awaiter};
use crate::{Coroutine, Exception};

/// An awaiter that either always or never suspends.
///
/// Suspending through `Suspend<true>` parks the coroutine without taking its
/// handle: control returns to whoever resumed it, and that caller still owns
/// the handle and can resume it again. This is the building block for
/// generators and for explicit yield points.
#[derive(Debug, Default, Clone, Copy)]
pub struct Suspend<const ALWAYS: bool>;

/// Parks the coroutine and returns control to its resumer.
pub type SuspendAlways = Suspend<true>;

/// Continues immediately.
pub type SuspendNever = Suspend<false>;

impl<const ALWAYS: bool> Awaitable for Suspend<ALWAYS> {
    fn ready(&mut self) -> bool {
        !ALWAYS
    }

    fn register(&mut self, _: &mut Coroutine) -> bool {
        true
    }
}

impl<const ALWAYS: bool> Awaiter for Suspend<ALWAYS> {
    type Output = ();

    fn resume(&mut self) -> Result<(), Exception> {
        Ok(())
    }
}
