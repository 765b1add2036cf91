//! Plain settings structs for loading policies from files or the environment.
//!
//! [`RetrySettings`] and [`BreakerSettings`] hold durations as milliseconds
//! so they read naturally in TOML or JSON. Missing fields take the defaults.
//!
//! ```rust
//! use steadfast::config::RetrySettings;
//!
//! let settings: RetrySettings = serde_json::from_str(r#"{ "max_attempts": 5 }"#).unwrap();
//! let policy = settings.into_policy().unwrap();
//! assert_eq!(policy.max_attempts(), 5);
//! ```

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::{ConfigError, ConfigResult, ErrorCategory};
use crate::retry::{RetryPolicy, RetryTable};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Serializable form of a [`RetryPolicy`] without its callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Exponential growth factor.
    pub backoff_factor: f64,
    /// Exclusive upper bound on jitter, in milliseconds.
    pub max_jitter_ms: u64,
    /// Categories that are never retried.
    pub non_retryable: Vec<ErrorCategory>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: millis(RetryPolicy::DEFAULT_BASE_DELAY),
            max_delay_ms: millis(RetryPolicy::DEFAULT_MAX_DELAY),
            backoff_factor: RetryPolicy::DEFAULT_BACKOFF_FACTOR,
            max_jitter_ms: millis(RetryPolicy::DEFAULT_MAX_JITTER),
            non_retryable: vec![ErrorCategory::Validation],
        }
    }
}

impl RetrySettings {
    /// Load settings from environment variables.
    ///
    /// This will look for:
    /// - `STEADFAST_RETRY_MAX_ATTEMPTS`
    /// - `STEADFAST_RETRY_BASE_DELAY_MS`
    /// - `STEADFAST_RETRY_MAX_DELAY_MS`
    /// - `STEADFAST_RETRY_BACKOFF_FACTOR`
    /// - `STEADFAST_RETRY_MAX_JITTER_MS`
    ///
    /// Unset variables keep their defaults. A variable that is set but does
    /// not parse is an error.
    pub fn from_env() -> ConfigResult<Self> {
        let mut settings = Self::default();

        if let Some(max_attempts) = env_var("STEADFAST_RETRY_MAX_ATTEMPTS", UINT)? {
            settings.max_attempts = max_attempts;
        }
        if let Some(base_delay_ms) = env_var("STEADFAST_RETRY_BASE_DELAY_MS", UINT)? {
            settings.base_delay_ms = base_delay_ms;
        }
        if let Some(max_delay_ms) = env_var("STEADFAST_RETRY_MAX_DELAY_MS", UINT)? {
            settings.max_delay_ms = max_delay_ms;
        }
        if let Some(backoff_factor) = env_var("STEADFAST_RETRY_BACKOFF_FACTOR", FLOAT)? {
            settings.backoff_factor = backoff_factor;
        }
        if let Some(max_jitter_ms) = env_var("STEADFAST_RETRY_MAX_JITTER_MS", UINT)? {
            settings.max_jitter_ms = max_jitter_ms;
        }

        Ok(settings)
    }

    /// Validate and convert into a [`RetryPolicy`].
    pub fn into_policy(self) -> ConfigResult<RetryPolicy> {
        let mut table = RetryTable::all();
        for category in self.non_retryable {
            table.set(category, false);
        }

        RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .backoff_factor(self.backoff_factor)
            .max_jitter(Duration::from_millis(self.max_jitter_ms))
            .retry_table(table)
            .build()
    }
}

/// Serializable form of a [`CircuitBreakerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before probing, in milliseconds.
    pub recovery_timeout_ms: u64,
    /// Window within which failures count as consecutive, in milliseconds.
    pub monitoring_period_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: CircuitBreakerConfig::DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_ms: millis(CircuitBreakerConfig::DEFAULT_RECOVERY_TIMEOUT),
            monitoring_period_ms: millis(CircuitBreakerConfig::DEFAULT_MONITORING_PERIOD),
        }
    }
}

impl BreakerSettings {
    /// Load settings from environment variables.
    ///
    /// This will look for:
    /// - `STEADFAST_BREAKER_FAILURE_THRESHOLD`
    /// - `STEADFAST_BREAKER_RECOVERY_TIMEOUT_MS`
    /// - `STEADFAST_BREAKER_MONITORING_PERIOD_MS`
    pub fn from_env() -> ConfigResult<Self> {
        let mut settings = Self::default();

        if let Some(threshold) = env_var("STEADFAST_BREAKER_FAILURE_THRESHOLD", UINT)? {
            settings.failure_threshold = threshold;
        }
        if let Some(recovery) = env_var("STEADFAST_BREAKER_RECOVERY_TIMEOUT_MS", UINT)? {
            settings.recovery_timeout_ms = recovery;
        }
        if let Some(period) = env_var("STEADFAST_BREAKER_MONITORING_PERIOD_MS", UINT)? {
            settings.monitoring_period_ms = period;
        }

        Ok(settings)
    }

    /// Validate and convert into a [`CircuitBreakerConfig`].
    pub fn into_config(self) -> ConfigResult<CircuitBreakerConfig> {
        CircuitBreakerConfig::builder()
            .failure_threshold(self.failure_threshold)
            .recovery_timeout(Duration::from_millis(self.recovery_timeout_ms))
            .monitoring_period(Duration::from_millis(self.monitoring_period_ms))
            .build()
    }
}

const UINT: &str = "a non-negative integer";
const FLOAT: &str = "a number";

fn env_var<T: FromStr>(var: &'static str, expected: &'static str) -> ConfigResult<Option<T>> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var,
                value: raw.clone(),
                expected,
            }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(raw)) => Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_string_lossy().into_owned(),
            expected,
        }),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy_defaults() {
        let policy = RetrySettings::default().into_policy().unwrap();
        assert_eq!(policy.max_attempts(), RetryPolicy::DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.base_delay(), RetryPolicy::DEFAULT_BASE_DELAY);
        assert_eq!(policy.max_delay(), RetryPolicy::DEFAULT_MAX_DELAY);
        assert_eq!(policy.max_jitter(), RetryPolicy::DEFAULT_MAX_JITTER);
        assert_eq!(*policy.retry_table(), RetryTable::default());

        let config = BreakerSettings::default().into_config().unwrap();
        assert_eq!(config, CircuitBreakerConfig::default());
    }

    #[test]
    fn test_retry_settings_from_toml() {
        let settings: RetrySettings = toml::from_str(
            r#"
            max_attempts = 6
            base_delay_ms = 250
            non_retryable = ["validation", "server"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.max_delay_ms, 30_000);
        let policy = settings.into_policy().unwrap();
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.base_delay(), Duration::from_millis(250));
        assert!(!policy.retry_table().allows(ErrorCategory::Server));
        assert!(policy.retry_table().allows(ErrorCategory::Network));
    }

    #[test]
    fn test_breaker_settings_from_json() {
        let settings: BreakerSettings =
            serde_json::from_str(r#"{"failure_threshold": 2, "recovery_timeout_ms": 50}"#).unwrap();
        let config = settings.into_config().unwrap();

        assert_eq!(config.failure_threshold(), 2);
        assert_eq!(config.recovery_timeout(), Duration::from_millis(50));
        assert_eq!(config.monitoring_period(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let settings = RetrySettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(
            settings.into_policy().unwrap_err(),
            ConfigError::InvalidMaxAttempts(0)
        );

        let settings = BreakerSettings {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(settings.into_config().is_err());
    }

    #[test]
    fn test_retry_from_env() {
        temp_env::with_vars(
            [
                ("STEADFAST_RETRY_MAX_ATTEMPTS", Some("7")),
                ("STEADFAST_RETRY_BACKOFF_FACTOR", Some("1.5")),
                ("STEADFAST_RETRY_BASE_DELAY_MS", None),
            ],
            || {
                let settings = RetrySettings::from_env().unwrap();
                assert_eq!(settings.max_attempts, 7);
                assert_eq!(settings.backoff_factor, 1.5);
                assert_eq!(settings.base_delay_ms, 1_000);
            },
        );
    }

    #[test]
    fn test_retry_from_env_rejects_garbage() {
        temp_env::with_var("STEADFAST_RETRY_MAX_ATTEMPTS", Some("lots"), || {
            let err = RetrySettings::from_env().unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidEnv {
                    var: "STEADFAST_RETRY_MAX_ATTEMPTS",
                    value: "lots".into(),
                    expected: "a non-negative integer",
                }
            );
        });
    }

    #[test]
    fn test_breaker_from_env() {
        temp_env::with_vars(
            [
                ("STEADFAST_BREAKER_FAILURE_THRESHOLD", Some("3")),
                ("STEADFAST_BREAKER_RECOVERY_TIMEOUT_MS", Some(" 1500 ")),
                ("STEADFAST_BREAKER_MONITORING_PERIOD_MS", None),
            ],
            || {
                let config = BreakerSettings::from_env().unwrap().into_config().unwrap();
                assert_eq!(config.failure_threshold(), 3);
                assert_eq!(config.recovery_timeout(), Duration::from_millis(1_500));
                assert_eq!(config.monitoring_period(), Duration::from_secs(60));
            },
        );
    }
}
