//! Lazy, pull-based generators.
//!
//! A generator body hands values out with [`Step::yield_value`] and is
//! driven by iterating the [`Generator`] its creation returns. The body does
//! not run until the first call to `next`.
//!
//! [`Step::yield_value`]: crate::Step::yield_value

use crate::awaiter::SuspendAlways;
use crate::promise::{Promise, Yield};
use crate::{Coroutine, Exception};

use std::fmt;
use std::iter::FusedIterator;

/// Promise of generator coroutines: holds the most recently yielded value.
pub struct GeneratorPromise<T> {
    value: Option<T>,
}

impl<T> GeneratorPromise<T> {
    pub fn new() -> Self {
        Self { value: None }
    }
}

impl<T> Default for GeneratorPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Promise for GeneratorPromise<T> {
    type Output = ();
    type Object = Generator<T>;

    fn get_return_object(coro: Coroutine<Self>) -> Generator<T> {
        Generator { coro }
    }

    fn initial_suspend(&mut self) -> bool {
        true
    }

    fn set_result(&mut self, (): ()) {}

    fn final_result(&mut self) -> Result<(), Exception> {
        Ok(())
    }
}

impl<T: Send + 'static> Yield<T> for GeneratorPromise<T> {
    type Awaiter = SuspendAlways;

    fn yield_value(&mut self, value: T) -> SuspendAlways {
        self.value = Some(value);
        SuspendAlways::default()
    }
}

/// Iterator over the values a generator body yields.
///
/// An error escaping the body ends the iteration after being reported once.
/// Dropping the generator before the body finishes unwinds its frame.
pub struct Generator<T> {
    coro: Coroutine<GeneratorPromise<T>>,
}

impl<T: Send + 'static> Iterator for Generator<T> {
    type Item = Result<T, Exception>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.coro.is_empty() {
            if let Err(error) = self.coro.resume() {
                return Some(Err(error));
            }

            if self.coro.is_empty() {
                break;
            }

            if let Some(value) = self.coro.promise_mut().value.take() {
                return Some(Ok(value));
            }
        }

        None
    }
}

impl<T: Send + 'static> FusedIterator for Generator<T> {}

impl<T> fmt::Debug for Generator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("done", &self.coro.is_empty())
            .finish()
    }
}
