//! # Coframe
//!
//! **Coframe** is a stackless coroutine engine for Rust. It turns a
//! hand-written (or generated) state machine into a heap-allocated,
//! resumable frame, and layers single-consumer and multi-consumer futures on
//! top of it.
//!
//! Unlike an async runtime, Coframe never decides *when* a coroutine runs:
//! suspending means returning to whoever resumed the frame, and resuming is
//! always an explicit call on a [`Coroutine`] handle or the completion of
//! something the coroutine awaited. It provides:
//!
//! - **Frames** with a program counter, a handler label for error regions
//!   that span suspension points, and inline scratch storage for awaiters
//! - A **promise protocol** customizing start, suspension, results, errors,
//!   cancellation and finalization
//! - A **three-phase awaiter protocol** (`ready`, `register`, `resume`)
//! - [`Task`], a single-consumer future, and [`SharedTask`], a
//!   multi-consumer future with a lock-free continuation list
//! - [`Generator`], a lazy iterator driven by yield points
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coframe::{Body, Exception, Flow, Label, START, Step, Task, TaskPromise};
//!
//! const JOINED: Label = 2;
//!
//! struct Double {
//!     input: Option<Task<i32>>,
//! }
//!
//! impl Body<TaskPromise<i32>> for Double {
//!     fn resume(&mut self, cx: &mut Step<'_, TaskPromise<i32>>) -> Result<Flow, Exception> {
//!         loop {
//!             match cx.label() {
//!                 START => {
//!                     let input = self.input.take().expect("started once");
//!                     if let Some(flow) = cx.await_on(JOINED, input) {
//!                         return Ok(flow);
//!                     }
//!                 }
//!                 JOINED => {
//!                     let value = cx.take::<Task<i32>>()?;
//!                     return cx.ret(value * 2);
//!                 }
//!                 _ => unreachable!(),
//!             }
//!         }
//!     }
//! }
//!
//! let mut doubled = coframe::create(TaskPromise::new(), Double {
//!     input: Some(Task::from_value(21)),
//! });
//!
//! assert_eq!(doubled.try_take().unwrap().unwrap(), 42);
//! ```
//!
//! ## Modules
//!
//! - [`awaiter`]: the suspension protocol and the basic awaiters
//! - [`coroutine`]: frames, handles, allocators and the builder
//! - [`task`]: single- and multi-consumer futures
//! - [`generator`]: lazy generators
//!
//! ## Getting Started
//!
//! Add Coframe to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! coframe = { git = "https://github.com/Nebula-ecosystem/coframe", package = "coframe" }
//! ```

mod error;
mod promise;
mod step;
mod utils;

pub mod awaiter;
pub mod coroutine;
pub mod generator;
pub mod task;

pub use awaiter::{Awaitable, Awaiter, DEFAULT_SCRATCH, Ready, Suspend, SuspendAlways, SuspendNever, ready};
pub use coroutine::{Builder, Coroutine, Erased, FrameAlloc, Global, create, try_create};
pub use error::{Error, Exception};
pub use generator::{Generator, GeneratorPromise};
pub use promise::{BasicPromise, Promise, Yield};
pub use step::{Body, Flow, Label, SENTINEL, START, Step, TryRegion};
pub use task::{SharedPromise, SharedTask, Task, TaskPromise};
