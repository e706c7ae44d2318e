use crate::Error;

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Storage provider for coroutine frames.
///
/// A frame captures the allocator it was created with and hands its own
/// storage back to that allocator exactly once, when the frame is released.
///
/// # Safety
///
/// `allocate` must return memory valid for reads and writes of
/// `layout.size()` bytes at `layout.align()` alignment, and that memory must
/// stay valid until it is passed back to `deallocate` with the same layout.
pub unsafe trait FrameAlloc: Send + 'static {
    /// Allocates storage for one frame.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error>;

    /// Returns storage previously obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator with the same `layout`, and must
    /// not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process-wide global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

unsafe impl FrameAlloc for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
        // Frames always carry a non-empty header, so `layout` is never zero-sized.
        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(Error::AllocFailed(layout))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
    }
}
