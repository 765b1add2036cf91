use crate::error::{ConfigError, ConfigResult};
use std::time::Duration;

/// Thresholds and timings for a [`CircuitBreaker`](super::CircuitBreaker).
///
/// Defaults: open after 5 consecutive failures, probe again after 60s, and
/// count failures as consecutive only while each follows the previous one
/// within 60s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    failure_threshold: u32,
    recovery_timeout: Duration,
    monitoring_period: Duration,
}

impl CircuitBreakerConfig {
    /// Default consecutive failures needed to open the circuit.
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    /// Default time the circuit stays open before a probe is allowed.
    pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
    /// Default window within which failures count as consecutive.
    pub const DEFAULT_MONITORING_PERIOD: Duration = Duration::from_secs(60);

    /// Create a builder seeded with the defaults.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    /// Consecutive failures that open the circuit.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// How long the circuit stays open before the next call probes.
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// A closed-phase failure arriving later than this after the previous
    /// one restarts the consecutive count.
    pub fn monitoring_period(&self) -> Duration {
        self.monitoring_period
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: Self::DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: Self::DEFAULT_RECOVERY_TIMEOUT,
            monitoring_period: Self::DEFAULT_MONITORING_PERIOD,
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: Option<u32>,
    recovery_timeout: Option<Duration>,
    monitoring_period: Option<Duration>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the consecutive failures that open the circuit.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Set how long the circuit stays open before probing.
    ///
    /// Default: 60s
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = Some(timeout);
        self
    }

    /// Set the window within which failures count as consecutive.
    ///
    /// Default: 60s
    pub fn monitoring_period(mut self, period: Duration) -> Self {
        self.monitoring_period = Some(period);
        self
    }

    /// Validate and build. Rejects `failure_threshold == 0`.
    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        let failure_threshold = self
            .failure_threshold
            .unwrap_or(CircuitBreakerConfig::DEFAULT_FAILURE_THRESHOLD);
        if failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(failure_threshold));
        }

        Ok(CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout: self
                .recovery_timeout
                .unwrap_or(CircuitBreakerConfig::DEFAULT_RECOVERY_TIMEOUT),
            monitoring_period: self
                .monitoring_period
                .unwrap_or(CircuitBreakerConfig::DEFAULT_MONITORING_PERIOD),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = CircuitBreakerConfig::builder().build().unwrap();
        assert_eq!(config, CircuitBreakerConfig::default());
        assert_eq!(config.failure_threshold(), 5);
        assert_eq!(config.recovery_timeout(), Duration::from_secs(60));
        assert_eq!(config.monitoring_period(), Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let err = CircuitBreakerConfig::builder()
            .failure_threshold(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidFailureThreshold(0));
    }
}
