//! Retry policies.

use crate::error::{ConfigError, ConfigResult, ErrorCategory, ErrorState};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Predicate deciding whether a classified failure is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&ErrorState, u32) -> bool + Send + Sync>;

/// Observer invoked before each backoff wait with `(state, attempt, delay)`.
pub type RetryObserver = Arc<dyn Fn(&ErrorState, u32, Duration) + Send + Sync>;

/// Which error categories are retryable when no predicate is supplied.
///
/// | Category     | Default |
/// |--------------|---------|
/// | `network`    | retry   |
/// | `timeout`    | retry   |
/// | `server`     | retry   |
/// | `unknown`    | retry   |
/// | `validation` | never   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTable {
    allowed: [bool; 5],
}

impl RetryTable {
    /// Table that retries every category.
    pub const fn all() -> Self {
        Self { allowed: [true; 5] }
    }

    /// Table that retries nothing.
    pub const fn none() -> Self {
        Self {
            allowed: [false; 5],
        }
    }

    /// Whether failures of `category` may be retried.
    pub fn allows(&self, category: ErrorCategory) -> bool {
        self.allowed[Self::index(category)]
    }

    /// Change the entry for `category`.
    pub fn set(&mut self, category: ErrorCategory, retryable: bool) {
        self.allowed[Self::index(category)] = retryable;
    }

    fn index(category: ErrorCategory) -> usize {
        match category {
            ErrorCategory::Network => 0,
            ErrorCategory::Timeout => 1,
            ErrorCategory::Server => 2,
            ErrorCategory::Validation => 3,
            ErrorCategory::Unknown => 4,
        }
    }
}

impl Default for RetryTable {
    fn default() -> Self {
        let mut table = Self::all();
        table.set(ErrorCategory::Validation, false);
        table
    }
}

/// How often, and how patiently, to retry.
///
/// Immutable once built; clone it freely (predicates are shared behind `Arc`).
///
/// Defaults: 3 attempts, 1s base delay, 30s cap, factor 2.0, jitter below 1s.
///
/// # Examples
///
/// ```rust
/// use steadfast::error::ErrorCategory;
/// use steadfast::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(5)
///     .base_delay(Duration::from_millis(200))
///     .should_retry(|state, _attempt| state.category == ErrorCategory::Network)
///     .build()
///     .unwrap();
///
/// assert_eq!(policy.max_attempts(), 5);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    max_jitter: Duration,
    table: RetryTable,
    should_retry: Option<RetryPredicate>,
    on_retry: Option<RetryObserver>,
}

impl RetryPolicy {
    /// Default number of attempts, including the first.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Default delay before the first retry.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
    /// Default upper bound on any single delay.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
    /// Default exponential growth factor.
    pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
    /// Default exclusive upper bound on jitter.
    pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1_000);

    /// Create a builder seeded with the defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry, before jitter.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any single delay, jitter included.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Exponential growth factor.
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Exclusive upper bound on the jitter added to each delay.
    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    /// The category table used when no predicate is supplied.
    pub fn retry_table(&self) -> &RetryTable {
        &self.table
    }

    /// Whether the failure of attempt `attempt` (0-based) earns another attempt.
    ///
    /// The final attempt is never eligible. Before that, a supplied
    /// `should_retry` predicate decides; otherwise the [`RetryTable`] does.
    pub fn is_eligible(&self, state: &ErrorState, attempt: u32) -> bool {
        if attempt.saturating_add(1) >= self.max_attempts {
            return false;
        }
        match &self.should_retry {
            Some(predicate) => predicate(state, attempt),
            None => self.table.allows(state.category),
        }
    }

    /// Defaults with `max_attempts` replaced. Cannot fail.
    pub fn with_max_attempts(max_attempts: NonZeroU32) -> Self {
        Self {
            max_attempts: max_attempts.get(),
            ..Self::default()
        }
    }

    /// Replace the base delay, raising `max_delay` to match if needed.
    pub(crate) fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = self.max_delay.max(base_delay);
        self
    }

    pub(crate) fn with_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.should_retry = Some(predicate);
        self
    }

    pub(crate) fn notify_retry(&self, state: &ErrorState, attempt: u32, delay: Duration) {
        if let Some(observer) = &self.on_retry {
            observer(state, attempt, delay);
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor <= 1.0 {
            return Err(ConfigError::InvalidBackoffFactor(self.backoff_factor));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::InvalidDelayRange {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            backoff_factor: Self::DEFAULT_BACKOFF_FACTOR,
            max_jitter: Self::DEFAULT_MAX_JITTER,
            table: RetryTable::default(),
            should_retry: None,
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("max_jitter", &self.max_jitter)
            .field("table", &self.table)
            .field("should_retry", &self.should_retry.as_ref().map(|_| "<predicate>"))
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<observer>"))
            .finish()
    }
}

/// Builder for [`RetryPolicy`].
///
/// Unset fields fall back to the defaults. [`build`](Self::build) rejects
/// `max_attempts == 0`, a backoff factor that is not a finite number above 1,
/// and a `max_delay` below `base_delay`.
#[derive(Default)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    backoff_factor: Option<f64>,
    max_jitter: Option<Duration>,
    table: Option<RetryTable>,
    should_retry: Option<RetryPredicate>,
    on_retry: Option<RetryObserver>,
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts, including the first.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the delay before the first retry.
    ///
    /// Default: 1s
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set the upper bound on any single delay.
    ///
    /// Default: 30s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the exponential growth factor.
    ///
    /// Default: 2.0
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = Some(factor);
        self
    }

    /// Set the exclusive upper bound on jitter. Zero disables jitter.
    ///
    /// Default: 1s
    pub fn max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = Some(jitter);
        self
    }

    /// Replace the category table used when no predicate is supplied.
    pub fn retry_table(mut self, table: RetryTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Override one entry of the category table.
    pub fn retry_category(mut self, category: ErrorCategory, retryable: bool) -> Self {
        self.table
            .get_or_insert_with(RetryTable::default)
            .set(category, retryable);
        self
    }

    /// Decide eligibility with `predicate(state, attempt)` instead of the table.
    pub fn should_retry<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ErrorState, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Observe each scheduled retry with `observer(state, attempt, delay)`.
    ///
    /// The observer runs before the backoff wait and cannot influence control
    /// flow. A panic inside it unwinds through the retry loop.
    pub fn on_retry<O>(mut self, observer: O) -> Self
    where
        O: Fn(&ErrorState, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Validate and build the policy.
    pub fn build(self) -> ConfigResult<RetryPolicy> {
        let policy = RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(RetryPolicy::DEFAULT_MAX_ATTEMPTS),
            base_delay: self.base_delay.unwrap_or(RetryPolicy::DEFAULT_BASE_DELAY),
            max_delay: self.max_delay.unwrap_or(RetryPolicy::DEFAULT_MAX_DELAY),
            backoff_factor: self
                .backoff_factor
                .unwrap_or(RetryPolicy::DEFAULT_BACKOFF_FACTOR),
            max_jitter: self.max_jitter.unwrap_or(RetryPolicy::DEFAULT_MAX_JITTER),
            table: self.table.unwrap_or_default(),
            should_retry: self.should_retry,
            on_retry: self.on_retry,
        };
        policy.validate()?;
        Ok(policy)
    }
}
