//! Circuit breaking for a single guarded operation.
//!
//! [`CircuitBreaker`] wraps an operation and tracks its failures. The state
//! machine itself lives in [`CircuitBreakerState`] as plain value transitions,
//! so it can be tested without a runtime.

mod breaker;
mod config;
mod state;

pub use breaker::CircuitBreaker;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use state::{Admission, CircuitBreakerState, CircuitState, Outcome};
