//! The step-function contract between the engine and a coroutine body.
//!
//! A body is a hand-written (or generated) state machine. Each time the
//! engine resumes the frame it calls [`Body::resume`], which dispatches on
//! the current [`Label`] and runs straight-line logic until the next
//! suspension point, an explicit return, or an error.
//!
//! ```rust,ignore
//! const FETCH: Label = 2;
//!
//! impl Body<TaskPromise<i32>> for Double {
//!     fn resume(&mut self, cx: &mut Step<'_, TaskPromise<i32>>) -> Result<Flow, Exception> {
//!         loop {
//!             match cx.label() {
//!                 START => {
//!                     let input = self.input.take().expect("started once");
//!                     if let Some(flow) = cx.await_on(FETCH, input) {
//!                         return Ok(flow);
//!                     }
//!                 }
//!                 FETCH => {
//!                     let value = cx.take::<Task<i32>>()?;
//!                     return cx.ret(value * 2);
//!                 }
//!                 _ => unreachable!(),
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! Every suspension label `L` also reserves `L + 1`: unwinding a parked
//! frame advances its program counter into that cleanup branch, which the
//! engine handles on the body's behalf. Labels from [`FRESH`] upwards are
//! reserved for the engine.

use crate::awaiter::Awaiter;
use crate::awaiter::scratch::ScratchView;
use crate::promise::{Promise, Yield};
use crate::{Coroutine, Exception};

use std::ptr::NonNull;

/// A program-counter or handler-label value.
pub type Label = u32;

/// Where every body starts.
pub const START: Label = 0;

/// "No further step" as a program counter; "no active handler" as a handler
/// label.
pub const SENTINEL: Label = !1;

/// A frame that was created but never resumed.
pub(crate) const FRESH: Label = !5;

/// A frame parked on its promise's initial suspension.
pub(crate) const INITIAL: Label = !3;

/// What a body asks the engine to do after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The coroutine is parked; return to the resumer without touching the
    /// frame again.
    Suspend,

    /// [`Step::ret`] delivered the result; finalize.
    Return,

    /// The body fell off its end; the promise's implicit-result hook decides
    /// whether that is a completion or a missing return.
    End,

    /// Take the cancellation path.
    Cancel,
}

/// A guarded region of the body.
///
/// Entering the region makes `handler` the active handler label; an error
/// raised while the region is active re-enters the body at `handler`. The
/// previously active label is `outer`, restored when the region is left or
/// when its handler runs, so nested regions form a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryRegion {
    pub handler: Label,
    pub outer: Label,
}

impl TryRegion {
    /// An outermost region.
    pub const fn new(handler: Label) -> Self {
        Self {
            handler,
            outer: SENTINEL,
        }
    }

    /// A region nested directly inside `self`.
    pub const fn nested(self, handler: Label) -> Self {
        Self {
            handler,
            outer: self.handler,
        }
    }
}

/// A resumable state machine driven by the engine.
pub trait Body<P: Promise>: Send + 'static {
    /// Advances the state machine by at most one suspension step.
    ///
    /// Returning `Err` is the body's way of throwing: the engine dispatches
    /// it to the active handler label, or hands it to the promise when no
    /// region is active.
    fn resume(&mut self, cx: &mut Step<'_, P>) -> Result<Flow, Exception>;
}

/// Everything a body can reach while it runs: the resumer's handle, the
/// program counter and handler label, the scratch storage and the promise.
pub struct Step<'a, P> {
    pub(crate) coro: &'a mut Coroutine,
    pub(crate) promise: &'a mut P,
    pub(crate) next: &'a mut Label,
    pub(crate) eh: &'a mut Label,
    pub(crate) scratch: ScratchView<'a>,
    pub(crate) exception: &'a mut Option<Exception>,
}

impl<P: Promise> Step<'_, P> {
    /// The label the body should dispatch on.
    pub fn label(&self) -> Label {
        *self.next
    }

    /// Moves the program counter without suspending.
    pub fn goto(&mut self, label: Label) {
        *self.next = label;
    }

    /// The currently active handler label.
    pub fn handler(&self) -> Label {
        *self.eh
    }

    pub fn promise(&mut self) -> &mut P {
        &mut *self.promise
    }

    /// Suspension point: awaits an owned value.
    ///
    /// The awaiter is moved into scratch storage and the program counter set
    /// to `label`. Returns `Some(flow)` if the body must hand `flow` back to
    /// the engine right away, or `None` if the awaiter was already satisfied
    /// and the body should continue at `label`, where it extracts the result
    /// with [`take`](Self::take).
    pub fn await_on<A>(&mut self, label: Label, awaiter: A) -> Option<Flow>
    where
        A: Awaiter + Send + 'static,
    {
        self.scratch.put(awaiter);
        self.suspend_on::<A>(label)
    }

    /// Suspension point: awaits a value the frame does not own.
    ///
    /// Only the address is stored; the awaiter is neither moved nor dropped.
    ///
    /// # Safety
    ///
    /// `awaiter` must outlive the suspension and must not be touched by
    /// anything else until [`take`](Self::take) extracts its result, which in
    /// practice means it is a field of the body's own state.
    pub unsafe fn await_ref<A>(&mut self, label: Label, awaiter: &mut A) -> Option<Flow>
    where
        A: Awaiter + 'static,
    {
        unsafe { self.scratch.put_ref(NonNull::from(awaiter)) };
        self.suspend_on::<A>(label)
    }

    /// Suspension point: hands a value to the promise and awaits whatever it
    /// answers with. Resume at `label` with [`take_yield`](Self::take_yield).
    pub fn yield_value<T>(&mut self, label: Label, value: T) -> Option<Flow>
    where
        P: Yield<T>,
    {
        let awaiter = self.promise.yield_value(value);
        self.await_on(label, awaiter)
    }

    fn suspend_on<A: Awaiter + 'static>(&mut self, label: Label) -> Option<Flow> {
        debug_assert!(label < FRESH, "label {label:#x} is reserved");

        *self.next = label;
        self.scratch.arm(label);

        let awaiter = self.scratch.get::<A>();

        if !awaiter.ready() {
            self.promise.on_suspend();

            // Safety: once `register` accepts the handle the frame may be
            // resumed elsewhere. The borrows of its promise, labels and
            // scratch held by `self` are not used past this point; the body
            // must return `Flow::Suspend` without touching `cx` again.
            if awaiter.register(self.coro) {
                return Some(Flow::Suspend);
            }

            if !self.promise.on_resume() {
                return Some(Flow::Suspend);
            }
        }

        if self.promise.cancellation_requested() {
            return Some(Flow::Cancel);
        }

        None
    }

    /// Extracts the result of the awaiter stored at the current suspension
    /// point and destroys it, rethrowing its failure through `?`.
    ///
    /// # Panics
    ///
    /// Panics if no awaiter is stored or if it is not an `A`.
    pub fn take<A: Awaiter + 'static>(&mut self) -> Result<A::Output, Exception> {
        let result = self.scratch.get::<A>().resume();
        self.scratch.disarm();

        result
    }

    /// Completes a yield point started with [`yield_value`](Self::yield_value).
    pub fn take_yield<T>(&mut self) -> Result<(), Exception>
    where
        P: Yield<T>,
    {
        self.take::<<P as Yield<T>>::Awaiter>()
    }

    /// Explicit return: hands `value` to the promise and finishes the body.
    pub fn ret(&mut self, value: P::Output) -> Result<Flow, Exception> {
        *self.next = SENTINEL;
        self.promise.set_result(value);

        Ok(Flow::Return)
    }

    /// Enters a guarded region.
    pub fn enter(&mut self, region: TryRegion) {
        debug_assert_eq!(*self.eh, region.outer, "regions must nest");
        *self.eh = region.handler;
    }

    /// Leaves a guarded region normally.
    pub fn leave(&mut self, region: TryRegion) {
        *self.eh = region.outer;
    }

    /// Runs at a region's handler label: restores the enclosing handler and
    /// returns the caught error. Returning it again as `Err` propagates it to
    /// the enclosing region.
    ///
    /// # Panics
    ///
    /// Panics if no error is pending, which means the handler label was
    /// reached through normal control flow.
    pub fn catch(&mut self, region: TryRegion) -> Exception {
        *self.eh = region.outer;

        match self.exception.take() {
            Some(error) => error,
            None => panic!("handler label {} reached without a pending error", region.handler),
        }
    }
}
