//! The circuit breaker and its half-open probe bookkeeping.

use super::config::CircuitBreakerConfig;
use super::state::{Admission, CircuitBreakerState, CircuitState, Outcome};
use crate::error::ResilienceError;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Guards one operation against repeated failure.
///
/// Once `failure_threshold` consecutive failures have been seen the circuit
/// opens and calls fail fast with [`ResilienceError::CircuitOpen`] without
/// reaching the operation. After `recovery_timeout` the next call is let
/// through as a probe; success closes the circuit, failure re-opens it.
///
/// # Concurrency
///
/// State transitions happen under a mutex, so concurrent callers never lose
/// an update. The lock is not held while the operation runs. In the closed
/// phase several calls may be in flight at once and each failure counts. In
/// the half-open phase exactly one probe runs at a time; other callers fail
/// fast until it settles.
///
/// # Examples
///
/// ```rust
/// use steadfast::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
///
/// # async fn example() {
/// let config = CircuitBreakerConfig::builder().failure_threshold(1).build().unwrap();
/// let breaker = CircuitBreaker::new(
///     |id: u32| async move { Err::<u32, _>(std::io::Error::other(format!("lookup {id} failed"))) },
///     config,
/// );
///
/// assert!(breaker.execute(7).await.is_err());
/// assert_eq!(breaker.state(), CircuitState::Open);
/// assert!(breaker.execute(8).await.unwrap_err().is_circuit_open());
/// # }
/// ```
pub struct CircuitBreaker<F> {
    operation: F,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: CircuitBreakerState,
    probe_in_flight: bool,
    /// Bumped by `reset`; outcomes admitted under an older epoch are discarded.
    epoch: u64,
}

impl<F> CircuitBreaker<F> {
    /// Guard `operation` with `config`. The breaker starts closed.
    pub fn new(operation: F, config: CircuitBreakerConfig) -> Self {
        Self {
            operation,
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Invoke the guarded operation with `args`, unless the circuit is open.
    ///
    /// The operation's own error comes back as
    /// [`ResilienceError::Operation`]; a fail-fast rejection as
    /// [`ResilienceError::CircuitOpen`].
    pub async fn execute<A, Fut, T, E>(&self, args: A) -> Result<T, ResilienceError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ticket = self.admit()?;

        let result = (self.operation)(args).await;
        let outcome = match result {
            Ok(_) => Outcome::Success,
            Err(_) => Outcome::Failure,
        };
        self.record(outcome, ticket);

        result.map_err(ResilienceError::Operation)
    }

    /// Current phase. Pure observer: an open circuit whose recovery timeout
    /// has elapsed still reads `Open` until the next call probes it.
    pub fn state(&self) -> CircuitState {
        self.lock().state.phase
    }

    /// Copy of the full state record.
    pub fn snapshot(&self) -> CircuitBreakerState {
        self.lock().state
    }

    /// Consecutive failures counted so far.
    pub fn failure_count(&self) -> u32 {
        self.lock().state.failure_count
    }

    /// The configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Return to closed with no failures, whatever the current phase.
    ///
    /// Calls already in flight finish normally, but their outcomes are not
    /// counted. A half-open probe that is still running keeps the probe slot
    /// until it settles.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let previous = inner.state.phase;
        inner.state = CircuitBreakerState::new();
        inner.epoch = inner.epoch.wrapping_add(1);
        info!(from = %previous, "circuit breaker reset");
    }

    fn admit<E>(&self) -> Result<Ticket<'_>, ResilienceError<E>> {
        let mut inner = self.lock();
        let previous = inner.state.phase;
        let (state, admission) = inner.state.admit(Instant::now(), &self.config);
        inner.state = state;
        let epoch = inner.epoch;

        match admission {
            Admission::Pass => Ok(Ticket { epoch, probe: None }),
            Admission::Probe if inner.probe_in_flight => {
                debug!("circuit breaker probe already in flight; failing fast");
                Err(ResilienceError::CircuitOpen)
            }
            Admission::Probe => {
                if previous == CircuitState::Open {
                    info!("circuit breaker half-open; probing");
                }
                inner.probe_in_flight = true;
                Ok(Ticket {
                    epoch,
                    probe: Some(ProbeGuard {
                        inner: &self.inner,
                        armed: true,
                    }),
                })
            }
            Admission::Reject => {
                debug!(
                    failures = inner.state.failure_count,
                    "circuit breaker open; failing fast"
                );
                Err(ResilienceError::CircuitOpen)
            }
        }
    }

    fn record(&self, outcome: Outcome, ticket: Ticket<'_>) {
        let mut inner = self.lock();
        // Only the probe holding the slot ever releases it.
        if let Some(mut probe) = ticket.probe {
            inner.probe_in_flight = false;
            probe.armed = false;
        }
        if ticket.epoch != inner.epoch {
            debug!(?outcome, "discarding outcome of a call admitted before reset");
            return;
        }

        let previous = inner.state.phase;
        inner.state = inner.state.record(outcome, Instant::now(), &self.config);

        match (previous, inner.state.phase) {
            (CircuitState::Closed | CircuitState::HalfOpen, CircuitState::Open) => warn!(
                failures = inner.state.failure_count,
                threshold = self.config.failure_threshold(),
                "circuit breaker opened"
            ),
            (CircuitState::HalfOpen, CircuitState::Closed) => {
                info!("circuit breaker closed after successful probe")
            }
            _ => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Admission granted to one call.
struct Ticket<'a> {
    epoch: u64,
    probe: Option<ProbeGuard<'a>>,
}

/// Frees the half-open probe slot if the caller's future is dropped mid-probe.
struct ProbeGuard<'a> {
    inner: &'a Mutex<Inner>,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock_inner(self.inner).probe_in_flight = false;
        }
    }
}

impl<F> fmt::Debug for CircuitBreaker<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}
