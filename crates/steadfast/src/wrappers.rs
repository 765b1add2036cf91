//! Convenience forms binding the retry loop, timeout race, and circuit
//! breaker to an operation.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::{DefaultClassifier, ErrorCategory, ErrorClassifier, ErrorState, ResilienceError};
use crate::retry::{RetryExecutor, RetryPolicy};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Bind `operation` to `policy`; every [`call`](Retrying::call) runs the
/// retry loop afresh.
///
/// The wrapper holds no per-call state, so it can be shared (for example
/// behind an `Arc`) and called concurrently.
///
/// [`call`](Retrying::call) takes exactly one argument, passed through to
/// `operation`. An operation with no arguments takes `()`, and one with
/// several takes them as a tuple: `|(id, verbose): (u64, bool)| ...`.
///
/// # Examples
///
/// ```rust
/// use steadfast::retry::RetryPolicy;
/// use steadfast::wrappers::with_retry;
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let fetch = with_retry(
///     |id: u64| async move { Ok::<_, std::io::Error>(format!("user-{id}")) },
///     RetryPolicy::default(),
/// );
///
/// assert_eq!(fetch.call(7).await?, "user-7");
/// # Ok(())
/// # }
/// ```
pub fn with_retry<F>(operation: F, policy: RetryPolicy) -> Retrying<F> {
    Retrying {
        operation,
        policy,
        executor: RetryExecutor::new(),
    }
}

/// An operation with a retry policy attached. Built by [`with_retry`].
pub struct Retrying<F, C = DefaultClassifier> {
    operation: F,
    policy: RetryPolicy,
    executor: RetryExecutor<C>,
}

impl<F, C> Retrying<F, C> {
    /// Run the attempts through `executor` instead of the default one.
    pub fn executor<C2>(self, executor: RetryExecutor<C2>) -> Retrying<F, C2> {
        Retrying {
            operation: self.operation,
            policy: self.policy,
            executor,
        }
    }

    /// The policy applied to each call.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke the operation with `args`, retrying under the bound policy.
    ///
    /// `args` is cloned for each attempt. Returns the raw error of the last
    /// attempt on failure.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Clone,
        C: ErrorClassifier<E>,
    {
        self.executor
            .execute(|| (self.operation)(args.clone()), &self.policy)
            .await
    }
}

impl<F, C: fmt::Debug> fmt::Debug for Retrying<F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("policy", &self.policy)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

/// Retry `operation` while `predicate(state, attempt)` holds, up to
/// `max_attempts`, starting from `base_delay`.
///
/// Other policy knobs keep their defaults; the delay cap is raised to
/// `base_delay` if that is larger.
pub async fn retry_with_condition<F, Fut, T, E, P>(
    operation: F,
    predicate: P,
    max_attempts: NonZeroU32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
    P: Fn(&ErrorState, u32) -> bool + Send + Sync + 'static,
{
    let policy = RetryPolicy::with_max_attempts(max_attempts)
        .with_base_delay(base_delay)
        .with_predicate(Arc::new(predicate));
    RetryExecutor::new().execute(operation, &policy).await
}

/// Retry `operation` only when it fails with `category`; any other failure
/// propagates on first occurrence.
///
/// ```rust
/// use steadfast::error::ErrorCategory;
/// use steadfast::wrappers::retry_on_category;
/// use std::num::NonZeroU32;
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let body = retry_on_category(
///     || async { Ok::<_, std::io::Error>("pong") },
///     ErrorCategory::Network,
///     NonZeroU32::new(5).unwrap(),
/// )
/// .await?;
/// assert_eq!(body, "pong");
/// # Ok(())
/// # }
/// ```
pub async fn retry_on_category<F, Fut, T, E>(
    operation: F,
    category: ErrorCategory,
    max_attempts: NonZeroU32,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
{
    let policy = RetryPolicy::with_max_attempts(max_attempts)
        .with_predicate(Arc::new(move |state: &ErrorState, _: u32| state.category == category));
    RetryExecutor::new().execute(operation, &policy).await
}

/// Retry `operation` under `policy`, bounding each attempt by `timeout`.
///
/// A timed-out attempt counts as a [`ErrorCategory::Timeout`] failure and
/// keeps running in the background. The sequence as a whole is not bounded.
pub async fn retry_with_timeout<F, Fut, T, E>(
    operation: F,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Error + Send + 'static,
{
    RetryExecutor::new()
        .execute_with_timeout(operation, timeout, policy)
        .await
}

/// Guard `operation` with a new [`CircuitBreaker`].
///
/// Unlike [`with_retry`], the result is stateful: keep it and call
/// [`execute`](CircuitBreaker::execute) on it.
pub fn with_circuit_breaker<F>(operation: F, config: CircuitBreakerConfig) -> CircuitBreaker<F> {
    CircuitBreaker::new(operation, config)
}
