use std::time::Duration;
use thiserror::Error;

/// Failure returned by the guarded forms: the circuit breaker and the timeout
/// race.
///
/// The operation's own error is carried unchanged in [`Operation`], so callers
/// can still match on it. The two synthetic variants never come from the
/// wrapped operation.
///
/// [`Operation`]: ResilienceError::Operation
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The wrapped operation failed; this is its raw error.
    #[error(transparent)]
    Operation(E),

    /// The circuit breaker rejected the call without invoking the operation.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The deadline elapsed before the operation completed.
    #[error("Operation timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        /// The bound that was exceeded.
        timeout: Duration,
    },
}

impl<E> ResilienceError<E> {
    /// Whether this is the breaker's fail-fast rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen)
    }

    /// Whether this is the timeout race's deadline error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Borrow the raw operation error, if this is one.
    pub fn operation(&self) -> Option<&E> {
        match self {
            Self::Operation(err) => Some(err),
            _ => None,
        }
    }

    /// Take the raw operation error, if this is one.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            _ => None,
        }
    }
}
