//! Atomic primitives for the lock-free parts of the crate.
//!
//! Under `cfg(loom)` these resolve to loom's model-checked atomics so the
//! shared-task continuation list can be explored exhaustively; otherwise
//! they are the standard library types.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicPtr, AtomicU8, AtomicUsize, Ordering, fence};

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU8, AtomicUsize, Ordering, fence};
