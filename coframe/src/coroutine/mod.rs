//! Coroutine frames and the handles that own them.
//!
//! A frame is a single heap allocation holding a header (program counter,
//! handler label and operation table), the promise, the allocator it came
//! from, the awaiter scratch storage and the body's state. A [`Coroutine`]
//! handle owns one frame and unwinds it when dropped.

mod alloc;
mod builder;
pub(crate) mod frame;
mod handle;

pub use alloc::{FrameAlloc, Global};
pub use builder::{Builder, create, try_create};
pub use handle::{Coroutine, Erased};
