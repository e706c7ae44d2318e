/// Task has not produced its result yet and nobody is waiting on it.
pub(crate) const PENDING: usize = 0;

/// A consumer registered its continuation.
///
/// The continuation is stored in the task core and will be resumed by
/// whoever completes the task.
pub(crate) const WAITING: usize = 1;

/// Task has completed with a value, an error or a cancellation.
///
/// The result slot is written and will not change until it is taken.
pub(crate) const COMPLETED: usize = 2;

/// Shared result not published yet.
pub(crate) const TAG_NULL: u8 = 0;

/// Shared result holds a value.
pub(crate) const TAG_VALUE: u8 = 1;

/// Shared result holds an error.
pub(crate) const TAG_EXCEPTION: u8 = 2;

/// Shared producer was cancelled.
pub(crate) const TAG_CANCELLED: u8 = 3;
