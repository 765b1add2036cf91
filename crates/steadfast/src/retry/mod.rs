//! Retrying with exponential backoff and jitter.
//!
//! # Key Types
//!
//! - [`RetryPolicy`] - How many attempts, how long to wait, what to retry
//! - [`RetryExecutor`] - Runs the retry loop with a pluggable classifier
//! - [`BackoffCalculator`] - Computes the wait before each retry
//!
//! # Examples
//!
//! ```rust
//! use steadfast::retry::{self, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(100))
//!     .build()
//!     .unwrap();
//!
//! let value = retry::execute(|| async { Ok::<_, std::io::Error>(42) }, &policy).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

mod backoff;
mod executor;
mod policy;

pub use backoff::{BackoffCalculator, JitterSource, compute_delay};
pub use executor::{RetryExecutor, Sleeper, TokioSleeper};
pub use policy::{RetryObserver, RetryPolicy, RetryPolicyBuilder, RetryPredicate, RetryTable};

use std::error::Error;
use std::future::Future;

/// Run `operation` under `policy` with a default [`RetryExecutor`].
///
/// Failures are classified by [`DefaultClassifier`](crate::error::DefaultClassifier);
/// use [`RetryExecutor::with_classifier`] for anything else.
pub async fn execute<F, Fut, T, E>(operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
{
    RetryExecutor::new().execute(operation, policy).await
}
