//! Circuit Breaker Pattern Implementation
//!
//! A fault-density gate that is independent of retry logic. It counts
//! attempts since the circuit last closed, opens once the count exceeds the
//! threshold, and rejects attempts until a cooldown promotes it to
//! half-open, where exactly one probe is admitted.
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |                     Circuit Breaker                               |
//! +-------------------------------------------------------------------+
//! |                                                                   |
//! |    +---------+   count > threshold   +--------+                   |
//! |    | CLOSED  | --------------------> |  OPEN  | <-------+         |
//! |    +---------+                       +--------+         |         |
//! |         ^                                 |             |         |
//! |         |                      reset timer|    probe    |         |
//! |         |                                 v    fails    |         |
//! |         |                          +-------------+      |         |
//! |         +---- close() on success --|  HALF-OPEN  |------+         |
//! |                                    +-------------+                |
//! |                                                                   |
//! |    any state --isolate()--> ISOLATED --close()--> CLOSED          |
//! |                                                                   |
//! +-------------------------------------------------------------------+
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use bulwark_foundation::circuit_breaker::CircuitBreaker;
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .named("payments")
//!     .open_circuit_after(5)
//!     .reset_after(Duration::from_secs(30))
//!     .build()?;
//!
//! // Attach the same breaker to several orchestrators; they share its state.
//! let resilient = Resilient::builder().short_circuit_with(breaker.clone()).build()?;
//! ```

pub mod config;
pub mod metrics;
pub mod state;

pub use config::{CircuitBreakerBuilder, CircuitBreakerConfig};
pub use metrics::{CircuitBreakerMetrics, CircuitBreakerMetricsSnapshot, StateTransition};
pub use state::{CircuitBreaker, TripHook};

pub use bulwark_kernel::CircuitState;
