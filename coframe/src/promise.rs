//! The promise customization point.
//!
//! Every frame embeds exactly one promise. The engine consults it at each
//! step of the coroutine's life: before starting, around every suspension,
//! when a result or an error is produced, when cancellation is observed, and
//! once more at finalization. Every hook except [`Promise::set_result`] and
//! [`Promise::get_return_object`] has a default, which is the behaviour a
//! promise gets when it does not provide that capability.

use crate::awaiter::Awaiter;
use crate::{Coroutine, Error, Exception};

use std::any::Any;

/// Customization object controlling one coroutine instance.
pub trait Promise: Send + Sized + 'static {
    /// The value a body completes with.
    type Output;

    /// What creating the coroutine hands back to the caller.
    type Object;

    /// Builds the caller-facing object from the freshly created frame.
    ///
    /// This is also where an eager promise resumes the coroutine for the
    /// first time.
    fn get_return_object(coro: Coroutine<Self>) -> Self::Object;

    /// Whether to suspend before running any of the body.
    fn initial_suspend(&mut self) -> bool {
        false
    }

    /// Called once the body is finished and its state destroyed.
    ///
    /// Returning `true` keeps the frame (and this promise) alive in a
    /// detached completion state; whoever holds on to it must later release
    /// it with [`Coroutine::destroy`]. Returning `false` releases the frame
    /// immediately after this call.
    fn final_suspend(&mut self) -> bool {
        false
    }

    /// Checked each time the coroutine re-enters a suspension point. A
    /// `true` answer sends it down its cleanup path.
    fn cancellation_requested(&self) -> bool {
        false
    }

    /// Called right before the coroutine registers with an awaiter.
    fn on_suspend(&mut self) {}

    /// Decides whether a resumption proceeds.
    ///
    /// Returning `false` abandons the resumption: on `run` the resumer's
    /// handle is detached instead of stepped, and a suspension point that
    /// found its awaiter satisfied during registration stops there.
    fn on_resume(&mut self) -> bool {
        true
    }

    /// Accepts the value produced by an explicit return.
    fn set_result(&mut self, value: Self::Output);

    /// Called when the body falls off its end without returning.
    ///
    /// Promises whose output is `()` accept this as an implicit result. The
    /// default reports [`Error::MissingReturn`], which the engine then routes
    /// through the exception path.
    fn final_result(&mut self) -> Result<(), Exception> {
        Err(Error::MissingReturn.into())
    }

    /// Accepts an error that escaped every handler region of the body.
    ///
    /// The default rethrows it, so it surfaces from
    /// [`Coroutine::resume`] in whoever was resuming the coroutine.
    fn set_exception(&mut self, error: Exception) -> Result<(), Exception> {
        Err(error)
    }

    /// Called on the cancellation path, after the body state is destroyed.
    fn cancel(&mut self) {}
}

/// Promises that accept values from yield points.
pub trait Yield<T>: Promise {
    /// What the coroutine awaits after yielding.
    type Awaiter: Awaiter<Output = ()> + Send + 'static;

    /// Accepts a yielded value.
    fn yield_value(&mut self, value: T) -> Self::Awaiter;
}

/// The default promise.
///
/// It starts the body eagerly when the coroutine is created and releases the
/// frame as soon as the body completes. Errors that escape the body are
/// rethrown to whoever resumed it.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicPromise;

impl Promise for BasicPromise {
    type Output = ();

    /// The handle after the first resumption. It is empty if the body already
    /// finished or handed itself to an awaiter.
    type Object = Result<Coroutine, Exception>;

    fn get_return_object(mut coro: Coroutine<Self>) -> Self::Object {
        coro.resume()?;
        Ok(coro.erase())
    }

    fn set_result(&mut self, (): ()) {}

    fn final_result(&mut self) -> Result<(), Exception> {
        Ok(())
    }
}

/// The value a body with output `T` implicitly completes with when it falls
/// off its end: `Some(())` when `T` is `()`, `None` for every other type.
pub(crate) fn implicit_result<T: 'static>() -> Option<T> {
    let unit: Box<dyn Any> = Box::new(());
    unit.downcast::<T>().ok().map(|unit| *unit)
}
