//! Circuit breaker states shared between the kernel error types and the
//! breaker implementation.
//!
//! ```text
//! Closed ──(threshold exceeded)──▶ Open ──(reset timer)──▶ HalfOpen
//!    ▲                                ▲                        │
//!    │                                └──── probe fails ───────┤
//!    └──────────────── close() on successful probe ────────────┘
//!
//! any state ──isolate()──▶ Isolated ──close()──▶ Closed
//! ```

use serde::{Deserialize, Serialize};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Healthy: attempts pass through and are counted.
    Closed,
    /// Tripped: attempts are rejected until the reset timer fires.
    Open,
    /// Probation: exactly one probe attempt is admitted.
    HalfOpen,
    /// Manually isolated: attempts are rejected until an explicit close.
    Isolated,
}

impl CircuitState {
    /// Whether attempts are rejected in this state.
    pub fn rejects(&self) -> bool {
        matches!(self, Self::Open | Self::Isolated)
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
            Self::Isolated => write!(f, "isolated"),
        }
    }
}
