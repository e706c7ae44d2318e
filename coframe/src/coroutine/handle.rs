use super::frame::{Header, promise_offset};
use crate::Exception;
use crate::promise::Promise;

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

/// Marker for handles whose promise type has been erased.
///
/// Continuations are stored as `Coroutine<Erased>` (spelled [`Coroutine`]),
/// which can be resumed and unwound but gives no access to the promise.
pub enum Erased {}

/// An owning, move-only reference to a coroutine frame.
///
/// A non-empty handle has exclusive ownership of its frame. Dropping it
/// unwinds the frame: a parked coroutine runs its cleanup path instead of
/// leaking. Handles become empty when they are moved out of (see
/// [`take`](Self::take)), detached, or when the coroutine they drive
/// completes or hands itself to an awaiter.
///
/// A frame must never be resumed from two threads at once; handles are
/// `Send` so ownership can move between threads, but resumptions of one
/// frame have to be serialized by the caller.
#[repr(transparent)]
pub struct Coroutine<P = Erased> {
    ptr: Option<NonNull<Header>>,
    _promise: PhantomData<fn() -> P>,
}

// Frames are only built from `Send` promises, bodies and allocators.
unsafe impl<P> Send for Coroutine<P> {}

impl<P> Coroutine<P> {
    /// An empty handle.
    pub const fn empty() -> Self {
        Self {
            ptr: None,
            _promise: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `ptr` must point to a live frame that no other handle owns, whose
    /// promise is a `P` unless `P` is [`Erased`].
    pub(crate) unsafe fn from_raw(ptr: NonNull<Header>) -> Self {
        Self {
            ptr: Some(ptr),
            _promise: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> Option<NonNull<Header>> {
        self.ptr
    }

    /// Returns `true` if this handle owns no frame.
    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    /// The address of the frame, or null for an empty handle.
    pub fn as_ptr(&self) -> *const () {
        self.ptr.map_or(ptr::null(), |ptr| ptr.as_ptr().cast_const().cast())
    }

    /// Abandons ownership without unwinding, leaving the handle empty.
    ///
    /// Returns the frame address. The frame stays alive; whatever else keeps
    /// track of it becomes responsible for it.
    pub fn detach(&mut self) -> *const () {
        let address = self.as_ptr();
        self.ptr = None;
        address
    }

    /// Moves the frame out, leaving this handle empty.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Unwinds the frame (if any), leaving the handle empty.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Forgets the promise type.
    pub fn erase(mut self) -> Coroutine {
        Coroutine {
            ptr: self.ptr.take(),
            _promise: PhantomData,
        }
    }

    fn as_erased(&mut self) -> &mut Coroutine {
        // `repr(transparent)` over the same pointer for every `P`.
        unsafe { &mut *(self as *mut Self).cast::<Coroutine>() }
    }

    /// Resumes the coroutine until it completes, suspends, or fails.
    ///
    /// Afterwards the handle is empty if the coroutine completed or handed
    /// itself to an awaiter. An `Err` is an error the body did not handle
    /// and its promise chose to rethrow.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty.
    pub fn resume(&mut self) -> Result<(), Exception> {
        let Some(ptr) = self.ptr else {
            panic!("resumed an empty coroutine handle");
        };

        unsafe { (ptr.as_ref().vtable().run)(ptr, self.as_erased()) }
    }

    /// Resumes a coroutine that has no one to report errors to, such as a
    /// continuation woken by a completed task.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty, or if the coroutine rethrows an error:
    /// continuations must be driven by promises that accept their errors.
    pub fn run(&mut self) {
        if let Err(error) = self.resume() {
            tracing::error!(%error, "error escaped a continuation");
            panic!("error escaped a continuation with no error channel: {error}");
        }
    }
}

impl<P: Promise> Coroutine<P> {
    /// The frame's promise.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty.
    pub fn promise(&self) -> &P {
        match self.promise_ptr() {
            Some(promise) => unsafe { promise.as_ref() },
            None => panic!("promise of an empty coroutine handle"),
        }
    }

    /// The frame's promise, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty.
    pub fn promise_mut(&mut self) -> &mut P {
        match self.promise_ptr() {
            Some(mut promise) => unsafe { promise.as_mut() },
            None => panic!("promise of an empty coroutine handle"),
        }
    }

    /// Address of the frame's promise.
    ///
    /// The pointer stays valid after the handle is gone for as long as the
    /// frame lives, which is what [`destroy`](Self::destroy) relies on.
    pub fn promise_ptr(&self) -> Option<NonNull<P>> {
        self.ptr
            .map(|ptr| unsafe { ptr.cast::<u8>().add(promise_offset::<P>()).cast::<P>() })
    }

    /// Releases a frame its promise kept alive from
    /// [`Promise::final_suspend`].
    ///
    /// # Safety
    ///
    /// `promise` must come from [`promise_ptr`](Self::promise_ptr) of a frame
    /// whose body completed and whose `final_suspend` returned `true`, and it
    /// must not have been destroyed already.
    pub unsafe fn destroy(promise: NonNull<P>) {
        unsafe {
            let header = promise.cast::<u8>().sub(promise_offset::<P>()).cast::<Header>();
            (header.as_ref().vtable().release)(header);
        }
    }
}

impl<P> Drop for Coroutine<P> {
    fn drop(&mut self) {
        let Some(ptr) = self.ptr else {
            return;
        };

        if let Err(error) = unsafe { (ptr.as_ref().vtable().unwind)(ptr, self.as_erased()) } {
            tracing::error!(%error, "error escaped while unwinding a coroutine");
        }
    }
}

impl<P> Default for Coroutine<P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<P, Q> PartialEq<Coroutine<Q>> for Coroutine<P> {
    fn eq(&self, other: &Coroutine<Q>) -> bool {
        self.as_ptr() == other.as_ptr()
    }
}

impl<P> Eq for Coroutine<P> {}

impl<P> fmt::Debug for Coroutine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Coroutine").field(&self.as_ptr()).finish()
    }
}
