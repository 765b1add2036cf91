//! Classified failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category assigned to a failure by an [`ErrorClassifier`](super::ErrorClassifier).
///
/// Retry predicates and the default [`RetryTable`](crate::retry::RetryTable)
/// decide on the category alone; they never look at the raw error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Transport-level failure (connection refused, reset, DNS, ...).
    Network,
    /// A deadline was exceeded.
    Timeout,
    /// The remote side answered with an error status.
    Server,
    /// The caller supplied bad input. Never worth retrying.
    Validation,
    /// Anything the classifier could not place.
    Unknown,
}

impl ErrorCategory {
    /// All categories, in declaration order.
    pub const ALL: [ErrorCategory; 5] = [
        ErrorCategory::Network,
        ErrorCategory::Timeout,
        ErrorCategory::Server,
        ErrorCategory::Validation,
        ErrorCategory::Unknown,
    ];

    /// Lowercase tag, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Server => "server",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure after classification.
///
/// Produced fresh for every failed attempt. It carries no retry decision of its
/// own; the active [`RetryPolicy`](crate::retry::RetryPolicy) consults it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorState {
    /// Category tag.
    pub category: ErrorCategory,
    /// Human-readable description, usually the raw error's `Display` output.
    pub message: String,
}

impl ErrorState {
    /// Create a classified failure.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    /// Shorthand for [`ErrorCategory::Network`].
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message)
    }

    /// Shorthand for [`ErrorCategory::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message)
    }

    /// Shorthand for [`ErrorCategory::Server`].
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Server, message)
    }

    /// Shorthand for [`ErrorCategory::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    /// Shorthand for [`ErrorCategory::Unknown`].
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }

    /// Whether the default retry table treats this failure as retryable.
    pub fn is_retryable(&self) -> bool {
        crate::retry::RetryTable::default().allows(self.category)
    }
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}
