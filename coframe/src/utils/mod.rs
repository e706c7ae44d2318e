//! Low-level utilities used internally by the engine.
//!
//! In particular, it exposes the atomic primitives shared by task
//! completion and the shared-task continuation list.

pub(crate) mod atomic;
