//! The result consumer: a user-supplied sink for per-frame outcomes.

use crate::domain::FrameResult;

/// Receives a `FrameResult` for every `SUCCESS` result the server reports.
/// Invoked synchronously from the Receiver task; implementations that need
/// to do real work should hand off to their own task rather than block the
/// receive loop.
pub trait Consumer: Send + Sync {
    fn on_result(&self, result: FrameResult);
}

impl<F> Consumer for F
where
    F: Fn(FrameResult) + Send + Sync,
{
    fn on_result(&self, result: FrameResult) {
        (self)(result)
    }
}
