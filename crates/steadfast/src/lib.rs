#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Resilient execution for async operations.
//!
//! This crate wraps an unreliable asynchronous operation (typically a remote
//! call) with:
//!
//! - **Retry with exponential backoff** via [`RetryExecutor`](retry::RetryExecutor)
//!   - Jitter from an injectable, seedable source
//!   - Retry decisions driven by a classified [`ErrorState`](error::ErrorState)
//! - **Timeout races** via [`race_with_timeout`](timeout::race_with_timeout)
//!   and the cancelling [`race_with_cancellation`](timeout::race_with_cancellation)
//! - **Circuit breaking** via [`CircuitBreaker`](circuit_breaker::CircuitBreaker)
//! - **Composition wrappers** in [`wrappers`] binding the above to an operation
//!
//! The operation itself is opaque: the crate only observes success, failure,
//! and elapsed time. Failures are mapped to a category by an
//! [`ErrorClassifier`](error::ErrorClassifier), usually supplied by the host
//! application.
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use steadfast::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(100))
//!     .build()?;
//!
//! let result = RetryExecutor::new()
//!     .execute(|| async { Ok::<_, std::io::Error>(42) }, &policy)
//!     .await?;
//! assert_eq!(result, 42);
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod retry;
pub mod timeout;
pub mod wrappers;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use steadfast::prelude::*;
/// ```
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::error::{ErrorCategory, ErrorClassifier, ErrorState, ResilienceError};
    pub use crate::retry::{JitterSource, RetryExecutor, RetryPolicy};
    pub use crate::timeout::{race_with_cancellation, race_with_timeout};
    pub use crate::wrappers::{
        retry_on_category, retry_with_condition, retry_with_timeout, with_circuit_breaker,
        with_retry,
    };
}
