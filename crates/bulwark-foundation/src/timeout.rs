//! Deadline race for a single attempt.
//!
//! The operation runs as its own tokio task and its join handle is raced
//! against a timer. When the timer wins the handle is dropped, which
//! detaches the task: the operation keeps running in the background and its
//! eventual result is discarded. Nothing cancels user code.

use std::future::Future;
use std::time::Duration;

use bulwark_kernel::{AttemptError, BoxError};
use tokio::task::JoinError;
use tracing::debug;

/// Settle `operation`, failing with [`AttemptError::TimedOut`] if `timeout`
/// elapses first.
///
/// With `None` (or a zero duration) no race happens and the future is
/// awaited in place.
pub async fn race<F, T>(operation: F, timeout: Option<Duration>) -> Result<T, AttemptError>
where
    F: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Send + 'static,
{
    let Some(deadline) = timeout.filter(|d| !d.is_zero()) else {
        return operation.await.map_err(AttemptError::operation);
    };

    let mut task = tokio::spawn(operation);
    tokio::select! {
        joined = &mut task => match joined {
            Ok(result) => result.map_err(AttemptError::operation),
            Err(err) => Err(join_failure(err)),
        },
        _ = tokio::time::sleep(deadline) => {
            debug!(timeout_ms = deadline.as_millis() as u64, "deadline won the race, detaching operation");
            Err(AttemptError::TimedOut(deadline))
        }
    }
}

fn join_failure(err: JoinError) -> AttemptError {
    if err.is_panic() {
        AttemptError::operation(format!("operation panicked: {err}"))
    } else {
        AttemptError::operation(format!("operation task failed: {err}"))
    }
}
