use std::alloc::Layout;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Failures raised by the engine itself.
///
/// Errors thrown by coroutine bodies travel as [`Exception`]s; the variants
/// here are the ones the engine produces on its own and converts into an
/// `Exception` when they have to cross a suspension point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The coroutine took its cancellation path instead of completing.
    #[error("coroutine was cancelled before producing a result")]
    Cancelled,

    /// The body fell off its end without handing a result to the promise.
    #[error("coroutine body completed without producing a result")]
    MissingReturn,

    /// The single-consumer result was already extracted.
    #[error("task result has already been taken")]
    ResultTaken,

    /// The frame allocator could not provide storage.
    #[error("frame allocation failed for {0:?}")]
    AllocFailed(Layout),
}

/// A type-erased error captured from a coroutine body.
///
/// `Exception` is cheap to clone: every clone refers to the same underlying
/// error, which lets a shared task rethrow one stored failure to any number
/// of consumers.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into an
/// `Exception`, so bodies can use `?` on ordinary fallible calls.
#[derive(Clone)]
pub struct Exception(Arc<dyn StdError + Send + Sync + 'static>);

impl Exception {
    /// Wraps an error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Builds an exception from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(Message(message))
    }

    /// Returns `true` if the wrapped error is of type `E`.
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    /// Returns a reference to the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` if both exceptions share the same underlying error.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Borrows the wrapped error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }
}

impl<E> From<E> for Exception
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

struct Message<M>(M);

impl<M: fmt::Debug> fmt::Debug for Message<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<M: fmt::Display> fmt::Display for Message<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<M: fmt::Display + fmt::Debug> StdError for Message<M> {}
