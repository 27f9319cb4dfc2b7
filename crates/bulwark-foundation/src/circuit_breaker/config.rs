//! Circuit Breaker Configuration
//!
//! Static options of a breaker and the builder that validates them.

use super::state::{CircuitBreaker, TripHook};
use bulwark_kernel::validation::{self, FirstError};
use bulwark_kernel::{CircuitState, ConfigError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Name/identifier for this circuit breaker
    pub name: String,
    /// Faults tolerated before the circuit opens
    pub failure_threshold: u32,
    /// Cooldown before an open circuit becomes half-open
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a strict configuration (opens quickly, recovers quickly)
    pub fn strict() -> Self {
        Self {
            failure_threshold: 2,
            reset_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Create a lenient configuration (tolerates many faults)
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            reset_timeout: Duration::from_secs(60),
            ..Default::default()
        }
    }

    /// Check every option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::non_empty("name", &self.name)?;
        validation::positive_count("open_circuit_after", self.failure_threshold)?;
        validation::positive_duration("reset_after", self.reset_timeout)?;
        Ok(())
    }
}

/// Fluent builder for [`CircuitBreaker`].
///
/// Out-of-range arguments are remembered and reported by [`build`](Self::build).
///
/// ```rust,ignore
/// let breaker = CircuitBreaker::builder()
///     .named("payments")
///     .open_circuit_after(3)
///     .reset_after(Duration::from_secs(5))
///     .if_tripped(|from, to| tracing::warn!(%from, %to, "payments breaker moved"))
///     .build()?;
/// ```
#[derive(Default)]
pub struct CircuitBreakerBuilder {
    config: CircuitBreakerConfig,
    on_trip: Option<TripHook>,
    errors: FirstError,
}

impl CircuitBreakerBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Name used in logs and open-circuit errors.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.errors.check(validation::non_empty("name", &name)).is_some() {
            self.config.name = name;
        }
        self
    }

    /// Open after more than `n` faulting attempts (`n > 0`).
    pub fn open_circuit_after(mut self, n: u32) -> Self {
        if let Some(n) = self.errors.check(validation::positive_count("open_circuit_after", n)) {
            self.config.failure_threshold = n;
        }
        self
    }

    /// Cooldown before an open circuit becomes half-open (`> 0`).
    pub fn reset_after(mut self, timeout: Duration) -> Self {
        if let Some(timeout) = self.errors.check(validation::positive_duration("reset_after", timeout)) {
            self.config.reset_timeout = timeout;
        }
        self
    }

    /// Callback fired on every state change with `(from, to)`.
    pub fn if_tripped<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.on_trip = Some(Arc::new(f));
        self
    }

    /// Validate and build the breaker in the closed state.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        self.errors.into_result()?;
        self.config.validate()?;
        Ok(CircuitBreaker::from_parts(self.config, self.on_trip))
    }
}
