use super::alloc::FrameAlloc;
use crate::awaiter::scratch::Scratch;
use crate::promise::Promise;
use crate::step::{Body, FRESH, Flow, INITIAL, Label, SENTINEL, START, Step};
use crate::{Coroutine, Error, Exception};

use std::alloc::Layout;
use std::cell::UnsafeCell;
use std::mem::{self, ManuallyDrop};
use std::ptr::{self, NonNull};

/// Operations every frame supports, whatever its promise, body and
/// allocator.
///
/// The table is built once per frame type and shared by all its instances;
/// handles reach it through the frame [`Header`].
///
/// # Safety
///
/// All functions must be called with a pointer to a live frame of the type
/// the table was built for, and `coro` must be the handle currently driving
/// that frame.
pub(crate) struct FrameVTable {
    /// Steps the frame once, unless its promise declines the resumption.
    pub(crate) run: unsafe fn(NonNull<Header>, &mut Coroutine) -> Result<(), Exception>,

    /// Advances into the cleanup branch of the current suspension point and
    /// steps the frame.
    pub(crate) unwind: unsafe fn(NonNull<Header>, &mut Coroutine) -> Result<(), Exception>,

    /// Destroys what is left of the frame and returns its storage.
    pub(crate) release: unsafe fn(NonNull<Header>),
}

/// The type-independent prefix of every frame.
///
/// Handles only ever point at a `Header`; everything else is reached through
/// the vtable.
#[repr(C)]
pub(crate) struct Header {
    vtable: &'static FrameVTable,

    /// Program counter.
    next: Label,

    /// Active handler label.
    eh: Label,

    /// Intrusive link used while the coroutine sits in a shared task's
    /// continuation list. Only the list owning the parked coroutine touches it.
    pub(crate) link: UnsafeCell<*mut Header>,
}

impl Header {
    pub(crate) fn vtable(&self) -> &'static FrameVTable {
        self.vtable
    }
}

/// A heap-allocated coroutine: header, promise, captured allocator, awaiter
/// scratch and the body's state.
///
/// `repr(C)` keeps the header first, so a frame pointer and a header pointer
/// are interchangeable, and puts the promise at an offset that depends only
/// on its own type (see [`promise_offset`]).
#[repr(C)]
pub(crate) struct Frame<P, F, A, const N: usize> {
    header: Header,
    promise: P,
    alloc: ManuallyDrop<A>,
    scratch: Scratch<N>,

    /// Destroyed at finalization, before the promise.
    body: ManuallyDrop<F>,
}

/// Offset of the promise within any frame embedding a `P`.
pub(crate) const fn promise_offset<P>() -> usize {
    let align = mem::align_of::<P>();
    (mem::size_of::<Header>() + align - 1) & !(align - 1)
}

/// How a step entered the frame.
enum Entry {
    Body,
    Suspend,
    Cleanup,
}

impl<P, F, A, const N: usize> Frame<P, F, A, N>
where
    P: Promise,
    F: Body<P>,
    A: FrameAlloc,
{
    const VTABLE: FrameVTable = FrameVTable {
        run: Self::run,
        unwind: Self::unwind,
        release: Self::release,
    };

    /// Allocates a frame through `alloc` and wraps it in an owning handle.
    ///
    /// The body does not run yet; the frame starts at its initial
    /// suspension check on first resumption.
    pub(crate) fn create(alloc: A, promise: P, body: F) -> Result<Coroutine<P>, Error> {
        let layout = Layout::new::<Self>();
        let ptr = alloc.allocate(layout)?.cast::<Self>();

        unsafe {
            ptr.as_ptr().write(Self {
                header: Header {
                    vtable: &Self::VTABLE,
                    next: FRESH,
                    eh: SENTINEL,
                    link: UnsafeCell::new(ptr::null_mut()),
                },
                promise,
                alloc: ManuallyDrop::new(alloc),
                scratch: Scratch::new(),
                body: ManuallyDrop::new(body),
            });
        }

        tracing::trace!(frame = ?ptr, size = layout.size(), "frame created");

        Ok(unsafe { Coroutine::from_raw(ptr.cast()) })
    }

    unsafe fn run(header: NonNull<Header>, coro: &mut Coroutine) -> Result<(), Exception> {
        let frame = header.cast::<Self>().as_ptr();

        if !unsafe { (*frame).promise.on_resume() } {
            coro.detach();
            return Ok(());
        }

        unsafe { Self::step(frame, coro) }
    }

    unsafe fn unwind(header: NonNull<Header>, coro: &mut Coroutine) -> Result<(), Exception> {
        let frame = header.cast::<Self>().as_ptr();

        unsafe {
            if !(*frame).promise.on_resume() {
                return Ok(());
            }

            let next = &mut (*frame).header.next;
            *next = next.wrapping_add(1);

            tracing::trace!(frame = ?header, next = *next, "frame unwinding");

            Self::step(frame, coro)
        }
    }

    unsafe fn release(header: NonNull<Header>) {
        let frame = header.cast::<Self>().as_ptr();

        unsafe {
            let alloc = ManuallyDrop::take(&mut (*frame).alloc);
            ptr::drop_in_place(&mut (*frame).promise);
            ptr::drop_in_place(&mut (*frame).scratch);

            alloc.deallocate(header.cast(), Layout::new::<Self>());
        }

        tracing::trace!(frame = ?header, "frame released");
    }

    /// The step function: prologue, body dispatch, error routing and
    /// finalization.
    ///
    /// Once the body reports [`Flow::Suspend`] the frame may already be owned
    /// (and resumed) elsewhere, so nothing here touches it afterwards.
    unsafe fn step(frame: *mut Self, coro: &mut Coroutine) -> Result<(), Exception> {
        match unsafe { Self::prologue(frame) } {
            Entry::Body => {}
            Entry::Suspend => return Ok(()),
            Entry::Cleanup => return unsafe { Self::cleanup(frame, coro) },
        }

        let mut exception = None;

        loop {
            // Safety: the frame is exclusively ours until the body returns,
            // except after a suspension point handed the handle away, from
            // which the body returns without touching `cx` or the frame.
            let flow = unsafe {
                let this = &mut *frame;
                let mut cx = Step {
                    coro: &mut *coro,
                    promise: &mut this.promise,
                    next: &mut this.header.next,
                    eh: &mut this.header.eh,
                    scratch: this.scratch.view(),
                    exception: &mut exception,
                };

                this.body.resume(&mut cx)
            };

            match flow {
                Ok(Flow::Suspend) => return Ok(()),
                Ok(Flow::Return) => return unsafe { Self::finish(frame, coro) },
                Ok(Flow::Cancel) => return unsafe { Self::cleanup(frame, coro) },
                Ok(Flow::End) => match unsafe { (*frame).promise.final_result() } {
                    Ok(()) => return unsafe { Self::finish(frame, coro) },
                    Err(error) => {
                        tracing::error!(frame = ?frame, %error, "coroutine body fell through without a return");
                        return unsafe { Self::fail(frame, coro, error) };
                    }
                },
                Err(error) => unsafe {
                    let header = &mut (*frame).header;
                    header.next = header.eh;
                    (*frame).scratch.view().disarm();

                    if header.next == SENTINEL {
                        return Self::fail(frame, coro, error);
                    }

                    tracing::trace!(frame = ?frame, handler = header.next, "error caught by handler");
                    exception = Some(error);
                }
            }
        }
    }

    /// Decides what a resumption does before any body code runs: the
    /// initial suspension, and the cancellation checkpoint of the
    /// suspension point being re-entered.
    unsafe fn prologue(frame: *mut Self) -> Entry {
        let this = unsafe { &mut *frame };
        let next = this.header.next;

        match next {
            FRESH => {
                this.header.eh = SENTINEL;

                if this.promise.initial_suspend() {
                    this.header.next = INITIAL;
                    this.promise.on_suspend();
                    return Entry::Suspend;
                }

                this.header.next = START;
                Entry::Body
            }
            INITIAL => {
                if this.promise.cancellation_requested() {
                    return Entry::Cleanup;
                }

                this.header.next = START;
                Entry::Body
            }
            _ if next == FRESH + 1 || next == INITIAL + 1 => Entry::Cleanup,
            _ => match this.scratch.view().label() {
                Some(label) if next == label.wrapping_add(1) => Entry::Cleanup,
                Some(label) if next == label && this.promise.cancellation_requested() => {
                    Entry::Cleanup
                }
                _ => Entry::Body,
            },
        }
    }

    unsafe fn drop_body(frame: *mut Self) {
        unsafe {
            (*frame).header.next = SENTINEL;
            (*frame).scratch.view().disarm();
            ManuallyDrop::drop(&mut (*frame).body);
        }
    }

    /// Normal completion.
    unsafe fn finish(frame: *mut Self, coro: &mut Coroutine) -> Result<(), Exception> {
        unsafe {
            Self::drop_body(frame);
            Self::finalize(frame, coro);
        }

        Ok(())
    }

    /// An error escaped every handler region.
    unsafe fn fail(frame: *mut Self, coro: &mut Coroutine, error: Exception) -> Result<(), Exception> {
        let rethrow = unsafe { (*frame).promise.set_exception(error) };

        unsafe {
            Self::drop_body(frame);
            Self::finalize(frame, coro);
        }

        rethrow
    }

    /// The cancellation path: the awaiter and the body state go first, then
    /// the promise hears about it.
    unsafe fn cleanup(frame: *mut Self, coro: &mut Coroutine) -> Result<(), Exception> {
        tracing::trace!(frame = ?frame, "coroutine cancelled");

        unsafe {
            Self::drop_body(frame);
            (*frame).promise.cancel();
            Self::finalize(frame, coro);
        }

        Ok(())
    }

    /// Runs exactly once per frame, after the body state is gone.
    unsafe fn finalize(frame: *mut Self, coro: &mut Coroutine) {
        // The handle must be empty before the promise runs: its final hook
        // may resume continuations that end up releasing this frame.
        coro.detach();

        unsafe {
            if !(*frame).promise.final_suspend() {
                Self::release(NonNull::new_unchecked(frame).cast());
            }
        }
    }
}
