//! Mapping raw failures to [`ErrorState`].

use super::resilience::ResilienceError;
use super::state::{ErrorCategory, ErrorState};
use std::error::Error;
use std::io;

/// Maps a raw failure into an [`ErrorState`].
///
/// The retry machinery never inspects raw errors itself. Every decision goes
/// through a classifier, which is usually supplied by the host application.
///
/// Any `Fn(&E) -> ErrorState` closure is a classifier:
///
/// ```rust
/// use steadfast::error::{ErrorClassifier, ErrorState};
///
/// let classify = |e: &std::io::Error| ErrorState::network(e.to_string());
/// let state = classify.classify(&std::io::Error::other("reset"));
/// assert_eq!(state.message, "reset");
/// ```
pub trait ErrorClassifier<E> {
    /// Classify one failure.
    fn classify(&self, error: &E) -> ErrorState;
}

impl<E, F> ErrorClassifier<E> for F
where
    F: Fn(&E) -> ErrorState,
{
    fn classify(&self, error: &E) -> ErrorState {
        self(error)
    }
}

/// Classifier that works for any `std::error::Error`.
///
/// Walks the source chain looking for `std::io::Error` kinds and tokio's
/// `Elapsed`, then falls back to keywords in the top-level message. Anything
/// it cannot place is [`ErrorCategory::Unknown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<E> ErrorClassifier<E> for DefaultClassifier
where
    E: Error + 'static,
{
    fn classify(&self, error: &E) -> ErrorState {
        classify_error(error)
    }
}

/// Classify a type-erased error with the [`DefaultClassifier`] rules.
pub fn classify_error(error: &(dyn Error + 'static)) -> ErrorState {
    let message = error.to_string();

    let mut current: Option<&(dyn Error + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if let Some(category) = io_category(io_err.kind()) {
                return ErrorState::new(category, message);
            }
        }
        if err.is::<tokio::time::error::Elapsed>() {
            return ErrorState::timeout(message);
        }
        current = err.source();
    }

    ErrorState::new(message_category(&message), message)
}

fn io_category(kind: io::ErrorKind) -> Option<ErrorCategory> {
    use io::ErrorKind::*;
    match kind {
        ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected | AddrInUse
        | AddrNotAvailable | BrokenPipe | UnexpectedEof => Some(ErrorCategory::Network),
        TimedOut => Some(ErrorCategory::Timeout),
        InvalidInput | InvalidData => Some(ErrorCategory::Validation),
        _ => None,
    }
}

fn message_category(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["timed out", "timeout", "deadline"]) {
        ErrorCategory::Timeout
    } else if has(&["network", "connection", "fetch", "dns", "unreachable"]) {
        ErrorCategory::Network
    } else if has(&["server", "status 5", "http 5", "unavailable", "bad gateway"]) {
        ErrorCategory::Server
    } else if has(&["invalid", "validation", "bad request"]) {
        ErrorCategory::Validation
    } else {
        ErrorCategory::Unknown
    }
}

/// Lifts a classifier for `E` to [`ResilienceError<E>`].
///
/// Synthetic timeouts classify as [`ErrorCategory::Timeout`] and open-circuit
/// rejections as [`ErrorCategory::Server`]; operation errors are handed to
/// the inner classifier untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResilienceClassifier<C>(pub C);

impl<E, C> ErrorClassifier<ResilienceError<E>> for ResilienceClassifier<C>
where
    C: ErrorClassifier<E>,
{
    fn classify(&self, error: &ResilienceError<E>) -> ErrorState {
        classify_resilience(&self.0, error)
    }
}

pub(crate) fn classify_resilience<E, C>(classifier: &C, error: &ResilienceError<E>) -> ErrorState
where
    C: ErrorClassifier<E>,
{
    match error {
        ResilienceError::Operation(inner) => classifier.classify(inner),
        ResilienceError::TimedOut { timeout } => ErrorState::timeout(format!(
            "Operation timed out after {}ms",
            timeout.as_millis()
        )),
        ResilienceError::CircuitOpen => ErrorState::server("circuit breaker is open"),
    }
}
