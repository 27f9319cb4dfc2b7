//! File-backed resilience settings.
//!
//! ```yaml
//! retry:
//!   max_attempts: 4        # 0 retries forever
//!   delay_ms: 200
//!   backoff: exponential   # static | linear | exponential | random
//! circuit_breaker:
//!   name: payments
//!   failure_threshold: 5
//!   reset_timeout_ms: 30000
//! timeout_ms: 2000
//! throttle_ms: 100
//! ```
//!
//! Every section is optional. Values go through the same builders as code
//! configuration, so the same validation applies.

use std::time::Duration;

use bulwark_kernel::ConfigError;
use serde::{Deserialize, Serialize};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig};
use crate::resilient::ResilientBuilder;
use crate::retry::{BackOff, DEFAULT_MAX_ATTEMPTS, RetryPolicy, RetryPolicyBuilder, UNBOUNDED};

/// Retry section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempt bound, `0` for no bound.
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    pub delay_ms: u64,
    /// Delay growth strategy.
    pub backoff: BackOff,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: 0,
            backoff: BackOff::Static,
        }
    }
}

impl RetrySettings {
    /// A policy builder preloaded with these values. Conditions and hooks
    /// can be added before `build()`.
    pub fn builder<T>(&self) -> RetryPolicyBuilder<T> {
        let builder = RetryPolicy::builder()
            .delay_between_retries(Duration::from_millis(self.delay_ms))
            .use_back_off(self.backoff);
        if self.max_attempts == UNBOUNDED {
            builder.retry_forever()
        } else {
            builder.stop_after(self.max_attempts)
        }
    }
}

/// Circuit breaker section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Breaker name.
    pub name: String,
    /// Faults tolerated before the circuit opens.
    pub failure_threshold: u32,
    /// Cooldown before half-open, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let config = CircuitBreakerConfig::default();
        Self {
            name: config.name,
            failure_threshold: config.failure_threshold,
            reset_timeout_ms: config.reset_timeout.as_millis() as u64,
        }
    }
}

impl CircuitBreakerSettings {
    /// A breaker builder preloaded with these values.
    pub fn builder(&self) -> CircuitBreakerBuilder {
        CircuitBreaker::builder()
            .named(self.name.clone())
            .open_circuit_after(self.failure_threshold)
            .reset_after(Duration::from_millis(self.reset_timeout_ms))
    }
}

/// Complete settings for one orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Retry policy, if any.
    pub retry: Option<RetrySettings>,
    /// Circuit breaker, if any.
    pub circuit_breaker: Option<CircuitBreakerSettings>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Minimum spacing between invocations in milliseconds.
    pub throttle_ms: Option<u64>,
}

impl ResilienceSettings {
    /// Load settings from a file; the format follows the extension and
    /// `${VAR}` references are expanded from the environment.
    #[cfg(feature = "settings")]
    pub fn load(path: &str) -> bulwark_kernel::ConfigResult<Self> {
        bulwark_kernel::config::load_config(path)
    }

    /// Like [`load`](Self::load), then apply `PREFIX__FIELD` environment
    /// overrides, e.g. `BULWARK__RETRY__MAX_ATTEMPTS=5`.
    #[cfg(feature = "settings")]
    pub fn load_with_env(path: &str, env_prefix: &str) -> bulwark_kernel::ConfigResult<Self> {
        bulwark_kernel::config::load_with_env(path, env_prefix)
    }

    /// Parse settings from a string in the given format.
    #[cfg(feature = "settings")]
    pub fn parse(
        content: &str,
        format: bulwark_kernel::config::FileFormat,
    ) -> bulwark_kernel::ConfigResult<Self> {
        bulwark_kernel::config::from_str(content, format)
    }

    /// Build the retry policy described by the `retry` section.
    pub fn retry_policy<T>(&self) -> Result<Option<RetryPolicy<T>>, ConfigError> {
        self.retry
            .as_ref()
            .map(|retry| retry.builder().build())
            .transpose()
    }

    /// Build the breaker described by the `circuit_breaker` section.
    pub fn circuit_breaker(&self) -> Result<Option<CircuitBreaker>, ConfigError> {
        self.circuit_breaker
            .as_ref()
            .map(|breaker| breaker.builder().build())
            .transpose()
    }

    /// Per-attempt timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Throttle interval, if configured.
    pub fn throttle_interval(&self) -> Option<Duration> {
        self.throttle_ms.map(Duration::from_millis)
    }

    /// Apply every configured section to `builder`.
    pub fn apply<T: Send + 'static>(
        &self,
        mut builder: ResilientBuilder<T>,
    ) -> Result<ResilientBuilder<T>, ConfigError> {
        if let Some(policy) = self.retry_policy()? {
            builder = builder.retry_with(policy);
        }
        if let Some(breaker) = self.circuit_breaker()? {
            builder = builder.short_circuit_with(breaker);
        }
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout_after(timeout);
        }
        if let Some(interval) = self.throttle_interval() {
            builder = builder.throttle(interval);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilient::Resilient;

    #[test]
    fn test_empty_settings_apply_nothing() {
        let settings = ResilienceSettings::default();
        let resilient = settings.apply(Resilient::<()>::builder()).unwrap().build().unwrap();
        assert!(resilient.retry_policy().is_none());
        assert!(resilient.circuit_breaker().is_none());
        assert!(resilient.timeout().is_none());
    }

    #[test]
    fn test_zero_attempts_means_forever() {
        let settings = RetrySettings {
            max_attempts: 0,
            ..Default::default()
        };
        let policy = settings.builder::<()>().build().unwrap();
        assert!(policy.is_unbounded());
    }

    #[test]
    fn test_invalid_breaker_is_rejected() {
        let settings = ResilienceSettings {
            circuit_breaker: Some(CircuitBreakerSettings {
                reset_timeout_ms: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(settings.circuit_breaker().is_err());
    }

    #[test]
    fn test_zero_timeout_fails_at_build() {
        let settings = ResilienceSettings {
            timeout_ms: Some(0),
            ..Default::default()
        };
        let builder = settings.apply(Resilient::<()>::builder()).unwrap();
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_json_round_trip_shape() {
        let settings: ResilienceSettings = serde_json::from_str(
            r#"{"retry":{"max_attempts":4,"backoff":"linear"},"timeout_ms":250}"#,
        )
        .unwrap();
        let retry = settings.retry.clone().unwrap();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.delay_ms, 0);
        assert_eq!(retry.backoff, BackOff::Linear);
        assert_eq!(settings.timeout(), Some(Duration::from_millis(250)));
        assert!(settings.circuit_breaker.is_none());
    }

    #[cfg(feature = "settings")]
    #[test]
    fn test_load_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "retry:\n  max_attempts: 2\n  delay_ms: 10\ncircuit_breaker:\n  name: search\n  failure_threshold: 3\nthrottle_ms: 50"
        )
        .unwrap();

        let settings = ResilienceSettings::load(file.path().to_str().unwrap()).unwrap();
        let breaker = settings.circuit_breaker().unwrap().unwrap();
        assert_eq!(breaker.name(), "search");
        assert_eq!(breaker.config().failure_threshold, 3);
        assert_eq!(settings.throttle_interval(), Some(Duration::from_millis(50)));

        let policy = settings.retry_policy::<u8>().unwrap().unwrap();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.delay(), Duration::from_millis(10));
    }

    #[cfg(feature = "settings")]
    #[test]
    fn test_env_overrides_file_values() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "retry:\n  max_attempts: 2\n  delay_ms: 10\ntimeout_ms: 500").unwrap();
        // SAFETY: variables are unique to this test.
        unsafe {
            std::env::set_var("BULWARK_SETTINGS_TEST__RETRY__MAX_ATTEMPTS", "6");
            std::env::set_var("BULWARK_SETTINGS_TEST__TIMEOUT_MS", "1500");
        }

        let settings = ResilienceSettings::load_with_env(
            file.path().to_str().unwrap(),
            "BULWARK_SETTINGS_TEST",
        )
        .unwrap();
        let retry = settings.retry.clone().unwrap();
        assert_eq!(retry.max_attempts, 6);
        assert_eq!(retry.delay_ms, 10);
        assert_eq!(settings.timeout(), Some(Duration::from_millis(1_500)));
    }

    #[cfg(feature = "settings")]
    #[test]
    fn test_missing_file_reports_io_error() {
        let report = ResilienceSettings::load("/nonexistent/bulwark.yaml").unwrap_err();
        assert!(matches!(report.current_context(), ConfigError::Io(_)));
    }
}
