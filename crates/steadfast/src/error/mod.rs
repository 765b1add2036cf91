//! Error types and failure classification.
//!
//! # Key Types
//!
//! - [`ErrorState`] / [`ErrorCategory`] - a failure after classification
//! - [`ErrorClassifier`] - maps a raw error into an [`ErrorState`]
//! - [`ResilienceError`] - raw error or one of the two synthetic failures
//! - [`ConfigError`] - rejected policies and settings

mod classifier;
mod resilience;
mod state;

pub use classifier::{DefaultClassifier, ErrorClassifier, ResilienceClassifier, classify_error};
pub(crate) use classifier::classify_resilience;
pub use resilience::ResilienceError;
pub use state::{ErrorCategory, ErrorState};

use std::time::Duration;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A retry policy, breaker config, or settings value was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `max_attempts` must be at least 1.
    #[error("max_attempts must be >= 1 (got {0})")]
    InvalidMaxAttempts(u32),

    /// `backoff_factor` must be a finite number greater than 1.
    #[error("backoff_factor must be finite and > 1.0 (got {0})")]
    InvalidBackoffFactor(f64),

    /// `max_delay` must not be below `base_delay`.
    #[error("max_delay ({max:?}) must be >= base_delay ({base:?})")]
    InvalidDelayRange {
        /// Configured base delay.
        base: Duration,
        /// Configured maximum delay.
        max: Duration,
    },

    /// `failure_threshold` must be at least 1.
    #[error("failure_threshold must be >= 1 (got {0})")]
    InvalidFailureThreshold(u32),

    /// An environment variable was set but could not be parsed.
    #[error("{var} must be {expected}, got: '{value}'")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// What a valid value looks like.
        expected: &'static str,
    },
}
