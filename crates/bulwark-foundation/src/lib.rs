//! Bulwark Foundation
//!
//! Resilience building blocks and the orchestrator that composes them:
//!
//! - [`circuit_breaker`]: shared fault-density gate with closed, open,
//!   half-open and isolated states
//! - [`retry`]: retry policy with value conditions and backoff strategies
//! - [`timeout`]: deadline race for a single attempt
//! - [`throttle`]: leading-edge invocation limiter with a coalesced
//!   trailing run
//! - [`resilient`]: the attempt loop, lifecycle hooks and fallback
//! - [`settings`]: serde settings that configure all of the above

// Circuit breaker module
pub mod circuit_breaker;

// Retry policy module
pub mod retry;

// Timeout racer
pub mod timeout;

// Throttle
pub mod throttle;

// Orchestrator
pub mod resilient;

// File-backed settings
pub mod settings;

pub use circuit_breaker::{
    // Config
    CircuitBreakerBuilder,
    CircuitBreakerConfig,
    // State
    CircuitBreaker,
    TripHook,
    // Metrics
    CircuitBreakerMetrics,
    CircuitBreakerMetricsSnapshot,
    StateTransition,
};
pub use resilient::{Disposition, Execution, Resilient, ResilientBuilder};
pub use retry::{BackOff, RetryPolicy, RetryPolicyBuilder};
pub use settings::{CircuitBreakerSettings, ResilienceSettings, RetrySettings};
pub use throttle::{Admission, Throttle};

pub use bulwark_kernel::{
    AttemptError, BoxError, CircuitState, ConfigError, ExecutionContext, Hook, LifecycleEvent,
    Operation,
};
