//! Futures built on coroutine frames.
//!
//! This module provides the two result-carrying coroutine flavours:
//!
//! - [`Task`], a single-consumer future produced by a coroutine running a
//!   [`TaskPromise`],
//! - [`SharedTask`], a multi-consumer future produced by a [`SharedPromise`]
//!   or by sharing a `Task`, which broadcasts its completion through a
//!   lock-free continuation list.
//!
//! Both start their producer eagerly and carry errors to their consumers
//! instead of rethrowing them to whoever resumed the producer.

mod core;
mod handle;
mod promise;
mod shared;
mod state;

pub use handle::Task;
pub use promise::TaskPromise;
pub use shared::{SharedPromise, SharedTask};
