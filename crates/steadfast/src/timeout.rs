//! Racing an operation against a deadline.
//!
//! Two flavours are offered:
//!
//! - [`race_with_timeout`] stops *waiting* at the deadline. The operation runs
//!   as a detached tokio task and keeps going; its eventual result is dropped.
//! - [`race_with_cancellation`] hands the operation a [`CancellationToken`]
//!   and cancels it at the deadline, so cooperative operations can stop and
//!   release what they hold.
//!
//! In neither case does "timed out" mean "stopped": side effects that already
//! happened are not undone.

use crate::error::ResilienceError;
use std::future::Future;
use std::panic;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Run `operation` against a `timeout` timer; whichever finishes first wins.
///
/// If the timer fires first, returns [`ResilienceError::TimedOut`], whose
/// message reads `Operation timed out after {timeout}ms`. The operation is
/// **not** cancelled: it was spawned onto the runtime and runs to completion
/// in the background.
///
/// A panic inside the operation is resumed on the caller.
///
/// # Examples
///
/// ```rust
/// use steadfast::timeout::race_with_timeout;
/// use std::time::Duration;
///
/// # async fn example() {
/// let slow = async {
///     tokio::time::sleep(Duration::from_millis(200)).await;
///     Ok::<_, std::io::Error>("late")
/// };
///
/// let err = race_with_timeout(slow, Duration::from_millis(100)).await.unwrap_err();
/// assert!(err.to_string().contains("100ms"));
/// # }
/// ```
pub async fn race_with_timeout<Fut, T, E>(
    operation: Fut,
    timeout: Duration,
) -> Result<T, ResilienceError<E>>
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = tokio::spawn(operation);
    await_deadline(handle, timeout).await
}

/// Run the operation built by `operation` against a `timeout` timer, cancelling
/// its [`CancellationToken`] if the timer fires first.
///
/// The operation still runs as its own task, so it can observe the token,
/// clean up, and finish on its own terms after the caller has moved on.
///
/// # Examples
///
/// ```rust
/// use steadfast::timeout::race_with_cancellation;
/// use std::time::Duration;
///
/// # async fn example() {
/// let result = race_with_cancellation(
///     |token| async move {
///         tokio::select! {
///             _ = token.cancelled() => Err(std::io::Error::other("cancelled")),
///             _ = tokio::time::sleep(Duration::from_secs(5)) => Ok(()),
///         }
///     },
///     Duration::from_millis(50),
/// )
/// .await;
///
/// assert!(result.unwrap_err().is_timeout());
/// # }
/// ```
pub async fn race_with_cancellation<F, Fut, T, E>(
    operation: F,
    timeout: Duration,
) -> Result<T, ResilienceError<E>>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let token = CancellationToken::new();
    let handle = tokio::spawn(operation(token.clone()));
    race_token(handle, token, timeout).await
}

pub(crate) async fn race_token<T, E>(
    handle: JoinHandle<Result<T, E>>,
    token: CancellationToken,
    timeout: Duration,
) -> Result<T, ResilienceError<E>> {
    let result = await_deadline(handle, timeout).await;
    if matches!(result, Err(ResilienceError::TimedOut { .. })) {
        token.cancel();
    }
    result
}

async fn await_deadline<T, E>(
    handle: JoinHandle<Result<T, E>>,
    timeout: Duration,
) -> Result<T, ResilienceError<E>> {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result.map_err(ResilienceError::Operation),
        Ok(Err(join_err)) => match join_err.try_into_panic() {
            Ok(payload) => panic::resume_unwind(payload),
            // Only runtime shutdown cancels the task; nothing will complete it.
            Err(_) => Err(ResilienceError::TimedOut { timeout }),
        },
        Err(_) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "operation timed out; abandoning wait"
            );
            Err(ResilienceError::TimedOut { timeout })
        }
    }
}
