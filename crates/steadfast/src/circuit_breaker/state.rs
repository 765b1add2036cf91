//! Breaker state as a value, with pure transitions.
//!
//! ```text
//! Closed   → Open:      failure_count reaches failure_threshold
//! Open     → HalfOpen:  a call arrives after recovery_timeout has elapsed
//! HalfOpen → Closed:    the probe succeeds
//! HalfOpen → Open:      the probe fails and failure_count reaches the threshold
//! ```

use super::config::CircuitBreakerConfig;
use std::fmt;
use tokio::time::Instant;

/// Phase of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls fail fast without reaching the operation.
    Open,
    /// Probationary: the next call tests whether the dependency recovered.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        })
    }
}

/// How one guarded call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation returned `Ok`.
    Success,
    /// The operation returned `Err`.
    Failure,
}

/// Verdict of [`CircuitBreakerState::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed: invoke the operation.
    Pass,
    /// Half-open: invoke the operation as a recovery probe.
    Probe,
    /// Open: fail fast.
    Reject,
}

/// Everything a breaker remembers between calls.
///
/// Invariants: `phase == Open` implies `last_failure.is_some()`, and
/// `phase == Closed` implies `failure_count < failure_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerState {
    /// Consecutive failures counted so far.
    pub failure_count: u32,
    /// When the most recent failure was recorded.
    pub last_failure: Option<Instant>,
    /// Current phase.
    pub phase: CircuitState,
}

impl CircuitBreakerState {
    /// Fresh state: closed with no failures.
    pub const fn new() -> Self {
        Self {
            failure_count: 0,
            last_failure: None,
            phase: CircuitState::Closed,
        }
    }

    /// Decide whether a call arriving at `now` may proceed.
    ///
    /// An open breaker whose recovery timeout has strictly elapsed moves to
    /// half-open and admits the call as a probe.
    pub fn admit(self, now: Instant, config: &CircuitBreakerConfig) -> (Self, Admission) {
        match self.phase {
            CircuitState::Closed => (self, Admission::Pass),
            CircuitState::HalfOpen => (self, Admission::Probe),
            CircuitState::Open => {
                let recovered = self.last_failure.is_none_or(|at| {
                    now.saturating_duration_since(at) > config.recovery_timeout()
                });
                if recovered {
                    let next = Self {
                        phase: CircuitState::HalfOpen,
                        ..self
                    };
                    (next, Admission::Probe)
                } else {
                    (self, Admission::Reject)
                }
            }
        }
    }

    /// Fold the outcome of a call that finished at `now` into the state.
    pub fn record(self, outcome: Outcome, now: Instant, config: &CircuitBreakerConfig) -> Self {
        match (self.phase, outcome) {
            (CircuitState::Closed | CircuitState::HalfOpen, Outcome::Success) => Self::new(),
            // A straggler admitted before the circuit opened; it proves nothing.
            (CircuitState::Open, Outcome::Success) => self,
            (CircuitState::Closed, Outcome::Failure) => {
                let within_window = self.last_failure.is_some_and(|at| {
                    now.saturating_duration_since(at) <= config.monitoring_period()
                });
                let failure_count = if within_window {
                    self.failure_count.saturating_add(1)
                } else {
                    1
                };
                Self::failed(failure_count, now, config)
            }
            (CircuitState::HalfOpen, Outcome::Failure) => {
                Self::failed(self.failure_count.saturating_add(1), now, config)
                    .or_phase(CircuitState::HalfOpen)
            }
            (CircuitState::Open, Outcome::Failure) => Self {
                failure_count: self.failure_count.saturating_add(1),
                last_failure: Some(now),
                phase: CircuitState::Open,
            },
        }
    }

    fn failed(failure_count: u32, now: Instant, config: &CircuitBreakerConfig) -> Self {
        let phase = if failure_count >= config.failure_threshold() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        };
        Self {
            failure_count,
            last_failure: Some(now),
            phase,
        }
    }

    /// Keep `Open`; otherwise use `below_threshold`.
    fn or_phase(self, below_threshold: CircuitState) -> Self {
        match self.phase {
            CircuitState::Open => self,
            _ => Self {
                phase: below_threshold,
                ..self
            },
        }
    }
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self::new()
    }
}
