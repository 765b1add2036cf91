//! The retry loop.

use super::backoff::{BackoffCalculator, JitterSource};
use super::policy::RetryPolicy;
use crate::error::{
    DefaultClassifier, ErrorClassifier, ErrorState, ResilienceError, classify_resilience,
};
use crate::timeout::{race_token, race_with_timeout};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Suspends the retry loop between attempts.
///
/// [`TokioSleeper`] is the production implementation. Tests can substitute a
/// sleeper that records the requested delays instead of waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// Sleeps with `tokio::time::sleep`, so paused test clocks apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Runs an operation repeatedly under a [`RetryPolicy`].
///
/// Each failure is classified with `C`, the policy decides whether another
/// attempt is warranted, and the [`BackoffCalculator`] picks the wait. The
/// executor holds no per-call state, so one instance can serve any number of
/// concurrent calls.
///
/// # Examples
///
/// ```rust
/// use steadfast::retry::{JitterSource, RetryExecutor, RetryPolicy};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let executor = RetryExecutor::new().jitter(JitterSource::none());
/// let policy = RetryPolicy::builder()
///     .base_delay(Duration::from_millis(10))
///     .build()
///     .unwrap();
///
/// let calls = AtomicU32::new(0);
/// let value = executor
///     .execute(
///         || async {
///             if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///                 Err(std::io::Error::other("connection reset"))
///             } else {
///                 Ok("success")
///             }
///         },
///         &policy,
///     )
///     .await?;
///
/// assert_eq!(value, "success");
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # Ok(())
/// # }
/// ```
pub struct RetryExecutor<C = DefaultClassifier> {
    classifier: C,
    backoff: BackoffCalculator,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor<DefaultClassifier> {
    /// Executor using the [`DefaultClassifier`], thread-local jitter, and tokio sleeps.
    pub fn new() -> Self {
        Self::with_classifier(DefaultClassifier)
    }
}

impl Default for RetryExecutor<DefaultClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RetryExecutor<C> {
    /// Executor classifying failures with `classifier`.
    pub fn with_classifier(classifier: C) -> Self {
        Self {
            classifier,
            backoff: BackoffCalculator::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Swap the classifier, keeping jitter and sleeper.
    pub fn classifier<C2>(self, classifier: C2) -> RetryExecutor<C2> {
        RetryExecutor {
            classifier,
            backoff: self.backoff,
            sleeper: self.sleeper,
        }
    }

    /// Draw jitter from `jitter`.
    pub fn jitter(mut self, jitter: JitterSource) -> Self {
        self.backoff = BackoffCalculator::new(jitter);
        self
    }

    /// Wait between attempts with `sleeper`.
    pub fn sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// The backoff calculator used between attempts.
    pub fn backoff(&self) -> &BackoffCalculator {
        &self.backoff
    }

    /// Run `operation` until it succeeds or the policy gives up.
    ///
    /// On success the value is returned immediately. When the policy declines
    /// another attempt, the operation's own error from the last attempt is
    /// returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, operation: F, policy: &RetryPolicy) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: ErrorClassifier<E>,
    {
        self.run(&self.classifier, operation, policy).await
    }

    /// Like [`execute`](Self::execute), but every attempt races a `timeout`.
    ///
    /// Each attempt is bounded on its own; the retry sequence as a whole is
    /// not. A timed-out attempt keeps running in the background (see
    /// [`race_with_timeout`]) and is classified as
    /// [`ErrorCategory::Timeout`](crate::error::ErrorCategory::Timeout).
    pub async fn execute_with_timeout<F, Fut, T, E>(
        &self,
        mut operation: F,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        C: ErrorClassifier<E>,
    {
        let classify = |err: &ResilienceError<E>| classify_resilience(&self.classifier, err);
        self.run(&classify, || race_with_timeout(operation(), timeout), policy)
            .await
    }

    /// Like [`execute_with_timeout`](Self::execute_with_timeout), but each
    /// attempt gets a fresh [`CancellationToken`] that is cancelled when that
    /// attempt's deadline passes (see
    /// [`race_with_cancellation`](crate::timeout::race_with_cancellation)).
    pub async fn execute_with_cancellation<F, Fut, T, E>(
        &self,
        mut operation: F,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        C: ErrorClassifier<E>,
    {
        let classify = |err: &ResilienceError<E>| classify_resilience(&self.classifier, err);
        let attempt = || {
            let token = CancellationToken::new();
            let handle = tokio::spawn(operation(token.clone()));
            race_token(handle, token, timeout)
        };
        self.run(&classify, attempt, policy).await
    }

    async fn run<K, F, Fut, T, E>(
        &self,
        classifier: &K,
        mut operation: F,
        policy: &RetryPolicy,
    ) -> Result<T, E>
    where
        K: ErrorClassifier<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    let state = classifier.classify(&err);
                    if !policy.is_eligible(&state, attempt) {
                        log_give_up(&state, attempt, policy);
                        return Err(err);
                    }

                    let delay = self.backoff.delay(attempt, policy);
                    debug!(
                        attempt,
                        category = %state.category,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after failure: {}",
                        state.message
                    );
                    policy.notify_retry(&state, attempt, delay);
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn log_give_up(state: &ErrorState, attempt: u32, policy: &RetryPolicy) {
    let attempts = attempt + 1;
    if attempts >= policy.max_attempts() {
        warn!(
            attempts,
            category = %state.category,
            "retries exhausted: {}",
            state.message
        );
    } else {
        warn!(
            attempts,
            category = %state.category,
            "failure not retryable: {}",
            state.message
        );
    }
}

impl<C: fmt::Debug> fmt::Debug for RetryExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("classifier", &self.classifier)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
