//! Exponential backoff with additive jitter.

use super::policy::RetryPolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Compute the delay before the retry that follows failed attempt `attempt`.
///
/// # Formula
///
/// ```text
/// delay = min(base_delay * backoff_factor ^ attempt + jitter, max_delay)
/// ```
///
/// `jitter` only ever adds, so the result is never below
/// `min(base_delay * backoff_factor ^ attempt, max_delay)` and never above
/// `max_delay`. Total over every `attempt`; overflow saturates at `max_delay`.
///
/// # Examples
///
/// ```rust
/// use steadfast::retry::{RetryPolicy, compute_delay};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .base_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(1))
///     .build()
///     .unwrap();
///
/// assert_eq!(compute_delay(2, &policy, Duration::ZERO), Duration::from_millis(400));
/// assert_eq!(compute_delay(9, &policy, Duration::ZERO), Duration::from_secs(1));
/// ```
pub fn compute_delay(attempt: u32, policy: &RetryPolicy, jitter: Duration) -> Duration {
    // Work in nanoseconds so whole-millisecond policies stay exact.
    let max = policy.max_delay().as_nanos() as f64;
    let exponent = attempt.min(i32::MAX as u32) as i32;
    // A zero base stays zero even when the growth term overflows to infinity.
    let exponential = if policy.base_delay().is_zero() {
        0.0
    } else {
        policy.base_delay().as_nanos() as f64 * policy.backoff_factor().powi(exponent)
    };

    let delay = exponential + jitter.as_nanos() as f64;
    if !delay.is_finite() || delay >= max {
        return policy.max_delay();
    }
    Duration::from_nanos(delay.round() as u64)
}

/// Source of jitter for [`BackoffCalculator`].
///
/// The thread-local generator is used by default. Tests swap in a seeded
/// generator or disable jitter entirely to get reproducible delays.
pub struct JitterSource {
    kind: JitterKind,
}

enum JitterKind {
    Thread,
    Seeded(Mutex<StdRng>),
    Disabled,
}

impl JitterSource {
    /// Draw from `rand::thread_rng()`.
    pub fn thread() -> Self {
        Self {
            kind: JitterKind::Thread,
        }
    }

    /// Draw from a `StdRng` seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            kind: JitterKind::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Always yield zero jitter.
    pub fn none() -> Self {
        Self {
            kind: JitterKind::Disabled,
        }
    }

    /// Draw uniformly from `[0, bound)`. A zero bound yields zero.
    pub fn sample(&self, bound: Duration) -> Duration {
        if bound.is_zero() {
            return Duration::ZERO;
        }
        let upper = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
        let nanos = match &self.kind {
            JitterKind::Thread => rand::thread_rng().gen_range(0..upper),
            JitterKind::Seeded(rng) => rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_range(0..upper),
            JitterKind::Disabled => 0,
        };
        Duration::from_nanos(nanos)
    }
}

impl Default for JitterSource {
    fn default() -> Self {
        Self::thread()
    }
}

impl fmt::Debug for JitterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            JitterKind::Thread => "thread",
            JitterKind::Seeded(_) => "seeded",
            JitterKind::Disabled => "disabled",
        };
        f.debug_struct("JitterSource").field("kind", &kind).finish()
    }
}

/// Draws jitter and feeds it to [`compute_delay`].
///
/// # Examples
///
/// ```rust
/// use steadfast::retry::{BackoffCalculator, JitterSource, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// let calculator = BackoffCalculator::new(JitterSource::seeded(7));
///
/// let delay = calculator.delay(0, &policy);
/// assert!(delay >= Duration::from_secs(1));
/// assert!(delay < Duration::from_secs(2));
/// ```
#[derive(Debug, Default)]
pub struct BackoffCalculator {
    jitter: JitterSource,
}

impl BackoffCalculator {
    /// Create a calculator drawing jitter from `jitter`.
    pub fn new(jitter: JitterSource) -> Self {
        Self { jitter }
    }

    /// Delay before the retry following failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32, policy: &RetryPolicy) -> Duration {
        let jitter = self.jitter.sample(policy.max_jitter());
        compute_delay(attempt, policy, jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(base_ms: u64, max_ms: u64, factor: f64) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(10)
            .base_delay(Duration::from_millis(base_ms))
            .max_delay(Duration::from_millis(max_ms))
            .backoff_factor(factor)
            .build()
            .unwrap()
    }

    #[test]
    fn test_exponential_delay_calculation() {
        let policy = policy(100, 10_000, 2.0);

        // Attempt 0: 100ms * 2^0 = 100ms
        assert_eq!(compute_delay(0, &policy, Duration::ZERO), Duration::from_millis(100));
        // Attempt 1: 100ms * 2^1 = 200ms
        assert_eq!(compute_delay(1, &policy, Duration::ZERO), Duration::from_millis(200));
        // Attempt 3: 100ms * 2^3 = 800ms
        assert_eq!(compute_delay(3, &policy, Duration::ZERO), Duration::from_millis(800));
    }

    #[test]
    fn test_jitter_is_added_before_cap() {
        let policy = policy(100, 1_000, 2.0);

        assert_eq!(
            compute_delay(1, &policy, Duration::from_millis(50)),
            Duration::from_millis(250)
        );
        // 800ms + 500ms jitter exceeds the cap
        assert_eq!(
            compute_delay(3, &policy, Duration::from_millis(500)),
            Duration::from_millis(1_000)
        );
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let policy = policy(1_000, 30_000, 10.0);
        assert_eq!(compute_delay(u32::MAX, &policy, Duration::ZERO), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_base_delay_yields_only_jitter() {
        let policy = policy(0, 30_000, 2.0);

        assert_eq!(
            compute_delay(1_100, &policy, Duration::from_millis(5)),
            Duration::from_millis(5)
        );
        assert_eq!(compute_delay(u32::MAX, &policy, Duration::ZERO), Duration::ZERO);
        assert_eq!(
            compute_delay(3, &policy, Duration::from_millis(7)),
            Duration::from_millis(7)
        );
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let policy = RetryPolicy::default();
        let a = BackoffCalculator::new(JitterSource::seeded(42));
        let b = BackoffCalculator::new(JitterSource::seeded(42));

        let first: Vec<_> = (0..5).map(|n| a.delay(n, &policy)).collect();
        let second: Vec<_> = (0..5).map(|n| b.delay(n, &policy)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_disabled_jitter() {
        let policy = RetryPolicy::default();
        let calculator = BackoffCalculator::new(JitterSource::none());
        assert_eq!(calculator.delay(0, &policy), Duration::from_secs(1));
        assert_eq!(calculator.delay(1, &policy), Duration::from_secs(2));
    }

    #[test]
    fn test_thread_jitter_varies() {
        let source = JitterSource::thread();
        let samples: Vec<_> = (0..20).map(|_| source.sample(Duration::from_secs(1))).collect();

        assert!(samples.iter().all(|s| *s < Duration::from_secs(1)));
        let all_same = samples.windows(2).all(|w| w[0] == w[1]);
        assert!(!all_same, "With randomization, samples should vary");
    }

    proptest! {
        #[test]
        fn prop_delay_within_bounds(
            attempt in 0u32..64,
            base_ms in 0u64..5_000,
            extra_ms in 0u64..60_000,
            factor in 1.01f64..10.0,
            seed in any::<u64>(),
        ) {
            let policy = policy(base_ms, base_ms + extra_ms, factor);
            let calculator = BackoffCalculator::new(JitterSource::seeded(seed));
            let delay = calculator.delay(attempt, &policy);

            prop_assert!(delay <= policy.max_delay());

            let floor = compute_delay(attempt, &policy, Duration::ZERO);
            prop_assert!(delay >= floor);
            prop_assert!(delay <= floor + policy.max_jitter());
        }
    }
}
