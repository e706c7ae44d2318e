use crate::step::Label;

use std::any::{TypeId, type_name};
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};

/// Default scratch budget, in bytes: two pointer-plus-int pairs.
pub const DEFAULT_SCRATCH: usize = (mem::size_of::<*const ()>() + mem::size_of::<i32>()) * 2;

/// Alignment guaranteed by the inline scratch buffer.
pub(crate) const SCRATCH_ALIGN: usize = 16;

/// Construction, access and destruction of one awaiter held in scratch
/// storage.
///
/// Each implementation describes one way of keeping the value: in place,
/// behind a heap box, or as a borrowed address.
pub(crate) trait Storage {
    type Value;
    type Target;

    /// # Safety
    ///
    /// `at` must point to free scratch bytes large and aligned enough for
    /// this storage kind.
    unsafe fn create(at: NonNull<u8>, value: Self::Value);

    /// # Safety
    ///
    /// `at` must hold a value written by `create` of the same storage kind.
    unsafe fn get<'a>(at: NonNull<u8>) -> &'a mut Self::Target;

    /// # Safety
    ///
    /// `at` must hold a value written by `create` of the same storage kind;
    /// the bytes are free again afterwards.
    unsafe fn reset(at: NonNull<u8>);
}

/// The awaiter lives directly in the scratch bytes.
pub(crate) struct Inline<A>(PhantomData<A>);

/// The awaiter is boxed and the box pointer lives in the scratch bytes.
pub(crate) struct Boxed<A>(PhantomData<A>);

/// Only the awaiter's address is kept; nothing is owned or destroyed.
pub(crate) struct ByRef<A>(PhantomData<A>);

impl<A> Storage for Inline<A> {
    type Value = A;
    type Target = A;

    unsafe fn create(at: NonNull<u8>, value: A) {
        unsafe { at.cast::<A>().as_ptr().write(value) }
    }

    unsafe fn get<'a>(at: NonNull<u8>) -> &'a mut A {
        unsafe { &mut *at.cast::<A>().as_ptr() }
    }

    unsafe fn reset(at: NonNull<u8>) {
        unsafe { ptr::drop_in_place(at.cast::<A>().as_ptr()) }
    }
}

impl<A> Storage for Boxed<A> {
    type Value = A;
    type Target = A;

    unsafe fn create(at: NonNull<u8>, value: A) {
        let boxed = Box::into_raw(Box::new(value));
        unsafe { at.cast::<*mut A>().as_ptr().write(boxed) }
    }

    unsafe fn get<'a>(at: NonNull<u8>) -> &'a mut A {
        unsafe { &mut **at.cast::<*mut A>().as_ptr() }
    }

    unsafe fn reset(at: NonNull<u8>) {
        unsafe { drop(Box::from_raw(at.cast::<*mut A>().as_ptr().read())) }
    }
}

impl<A> Storage for ByRef<A> {
    type Value = NonNull<A>;
    type Target = A;

    unsafe fn create(at: NonNull<u8>, value: NonNull<A>) {
        unsafe { at.cast::<NonNull<A>>().as_ptr().write(value) }
    }

    unsafe fn get<'a>(at: NonNull<u8>) -> &'a mut A {
        unsafe { &mut *at.cast::<NonNull<A>>().as_ptr().read().as_ptr() }
    }

    unsafe fn reset(_: NonNull<u8>) {}
}

#[repr(C, align(16))]
struct Bytes<const N: usize>([MaybeUninit<u8>; N]);

/// Bookkeeping for the suspension point that currently owns the scratch.
#[derive(Default)]
pub(crate) struct Meta {
    /// Label of the armed suspension point, if the frame is parked on one.
    label: Option<Label>,

    /// The stored awaiter, if any.
    held: Option<Held>,
}

struct Held {
    /// `TypeId` of the storage kind used, which also pins the awaiter type.
    storage: TypeId,
    reset: unsafe fn(NonNull<u8>),
}

/// Inline temporary storage for the awaiter of the current suspension point.
///
/// Awaiters that fit in `N` bytes at [`SCRATCH_ALIGN`] alignment are kept in
/// place; larger ones are boxed. The frame owns exactly one `Scratch`, so at
/// most one awaiter is alive per frame at any time.
pub(crate) struct Scratch<const N: usize> {
    bytes: Bytes<N>,
    meta: Meta,
}

impl<const N: usize> Scratch<N> {
    const HOLDS_POINTER: () = assert!(
        N >= mem::size_of::<*mut u8>(),
        "scratch budget must be able to hold a box pointer"
    );

    pub(crate) fn new() -> Self {
        let () = Self::HOLDS_POINTER;

        Self {
            bytes: Bytes([MaybeUninit::uninit(); N]),
            meta: Meta::default(),
        }
    }

    /// Borrows the scratch without its size parameter.
    pub(crate) fn view(&mut self) -> ScratchView<'_> {
        ScratchView {
            bytes: NonNull::from(&mut self.bytes).cast(),
            capacity: N,
            meta: &mut self.meta,
        }
    }
}

impl<const N: usize> Drop for Scratch<N> {
    fn drop(&mut self) {
        self.view().disarm();
    }
}

/// Size-erased access to a frame's [`Scratch`].
pub(crate) struct ScratchView<'a> {
    bytes: NonNull<u8>,
    capacity: usize,
    meta: &'a mut Meta,
}

impl ScratchView<'_> {
    fn fits<A>(&self) -> bool {
        mem::size_of::<A>() <= self.capacity && mem::align_of::<A>() <= SCRATCH_ALIGN
    }

    /// Label of the suspension point the frame is parked on.
    pub(crate) fn label(&self) -> Option<Label> {
        self.meta.label
    }

    pub(crate) fn arm(&mut self, label: Label) {
        self.meta.label = Some(label);
    }

    /// Stores an owned awaiter, inline when it fits and boxed otherwise.
    pub(crate) fn put<A: 'static>(&mut self, value: A) {
        self.reset();

        unsafe {
            if self.fits::<A>() {
                self.create::<Inline<A>>(value);
            } else {
                self.create::<Boxed<A>>(value);
            }
        }
    }

    /// Stores the address of an awaiter owned elsewhere.
    ///
    /// # Safety
    ///
    /// The referent must stay valid, and must not be accessed by anything
    /// else, until the scratch is reset.
    pub(crate) unsafe fn put_ref<A: 'static>(&mut self, value: NonNull<A>) {
        self.reset();
        unsafe { self.create::<ByRef<A>>(value) }
    }

    unsafe fn create<S: Storage + 'static>(&mut self, value: S::Value) {
        unsafe { S::create(self.bytes, value) };

        self.meta.held = Some(Held {
            storage: TypeId::of::<S>(),
            reset: S::reset,
        });
    }

    /// Returns the stored awaiter.
    ///
    /// # Panics
    ///
    /// Panics if nothing is stored or if `A` is not the stored type.
    pub(crate) fn get<A: 'static>(&mut self) -> &mut A {
        let Some(held) = &self.meta.held else {
            panic!("no awaiter is stored at this suspension point");
        };
        let storage = held.storage;

        unsafe {
            if storage == TypeId::of::<Inline<A>>() {
                Inline::<A>::get(self.bytes)
            } else if storage == TypeId::of::<Boxed<A>>() {
                Boxed::<A>::get(self.bytes)
            } else if storage == TypeId::of::<ByRef<A>>() {
                ByRef::<A>::get(self.bytes)
            } else {
                panic!(
                    "awaiter extracted as `{}`, which is not the stored type",
                    type_name::<A>()
                );
            }
        }
    }

    /// Destroys the stored awaiter, if any. The armed label is kept.
    pub(crate) fn reset(&mut self) {
        if let Some(held) = self.meta.held.take() {
            unsafe { (held.reset)(self.bytes) }
        }
    }

    /// Destroys the stored awaiter and forgets the armed label.
    pub(crate) fn disarm(&mut self) {
        self.reset();
        self.meta.label = None;
    }
}
