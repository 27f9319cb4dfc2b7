//! Circuit Breaker Metrics
//!
//! Counters for admitted and rejected attempts, trips and state
//! transitions, plus a bounded history of the most recent transitions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bulwark_kernel::CircuitState;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Number of transitions kept in the history.
pub const TRANSITION_HISTORY: usize = 100;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// State transition event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous state
    pub from_state: CircuitState,
    /// New state
    pub to_state: CircuitState,
    /// Timestamp of transition (milliseconds since Unix epoch)
    pub timestamp_ms: u64,
}

impl StateTransition {
    /// Create a new state transition stamped with the current time
    pub fn new(from_state: CircuitState, to_state: CircuitState) -> Self {
        Self {
            from_state,
            to_state,
            timestamp_ms: now_ms(),
        }
    }
}

/// Circuit breaker metrics
#[derive(Debug, Default)]
pub struct CircuitBreakerMetrics {
    /// Attempts the breaker let through
    total_admitted: AtomicU64,
    /// Attempts rejected while open or isolated
    total_rejected: AtomicU64,
    /// Transitions into the open state
    total_trips: AtomicU64,
    /// All state transitions
    total_transitions: AtomicU64,
    /// Time spent in rejecting states, closed periods only (milliseconds)
    total_open_duration_ms: AtomicU64,
    /// When the current rejecting period started (ms since epoch, 0 if none)
    current_open_started_at: AtomicU64,
    transitions: RwLock<VecDeque<StateTransition>>,
}

impl CircuitBreakerMetrics {
    /// Create new metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt that passed the breaker
    pub fn record_admitted(&self) {
        self.total_admitted.fetch_add(1, Ordering::SeqCst);
    }

    /// Withdraw an admission whose attempt never ran
    pub fn record_released(&self) {
        let _ = self
            .total_admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
    }

    /// Record an attempt rejected by the breaker
    pub fn record_rejected(&self) {
        self.total_rejected.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a state transition
    pub fn record_transition(&self, transition: StateTransition) {
        self.total_transitions.fetch_add(1, Ordering::SeqCst);

        if transition.to_state == CircuitState::Open {
            self.total_trips.fetch_add(1, Ordering::SeqCst);
        }

        match (transition.from_state.rejects(), transition.to_state.rejects()) {
            (false, true) => {
                self.current_open_started_at
                    .store(transition.timestamp_ms, Ordering::SeqCst);
            }
            (true, false) => {
                let started = self.current_open_started_at.swap(0, Ordering::SeqCst);
                if started > 0 {
                    self.total_open_duration_ms.fetch_add(
                        transition.timestamp_ms.saturating_sub(started),
                        Ordering::SeqCst,
                    );
                }
            }
            _ => {}
        }

        let mut transitions = self.transitions.write();
        transitions.push_back(transition);
        while transitions.len() > TRANSITION_HISTORY {
            transitions.pop_front();
        }
    }

    /// Get total admitted attempts
    pub fn total_admitted(&self) -> u64 {
        self.total_admitted.load(Ordering::SeqCst)
    }

    /// Get total rejected attempts
    pub fn total_rejected(&self) -> u64 {
        self.total_rejected.load(Ordering::SeqCst)
    }

    /// Get the number of times the breaker opened
    pub fn total_trips(&self) -> u64 {
        self.total_trips.load(Ordering::SeqCst)
    }

    /// Get total transitions
    pub fn total_transitions(&self) -> u64 {
        self.total_transitions.load(Ordering::SeqCst)
    }

    /// Time spent rejecting attempts, counting finished periods only
    pub fn total_open_duration(&self) -> Duration {
        Duration::from_millis(self.total_open_duration_ms.load(Ordering::SeqCst))
    }

    /// Get the retained state transitions, oldest first
    pub fn transitions(&self) -> Vec<StateTransition> {
        self.transitions.read().iter().cloned().collect()
    }

    /// Get the most recent `n` transitions, oldest first
    pub fn recent_transitions(&self, n: usize) -> Vec<StateTransition> {
        let transitions = self.transitions.read();
        let skip = transitions.len().saturating_sub(n);
        transitions.iter().skip(skip).cloned().collect()
    }

    /// Take a snapshot of current metrics
    pub fn snapshot(&self) -> CircuitBreakerMetricsSnapshot {
        CircuitBreakerMetricsSnapshot {
            total_admitted: self.total_admitted(),
            total_rejected: self.total_rejected(),
            total_trips: self.total_trips(),
            total_transitions: self.total_transitions(),
            total_open_duration_ms: self.total_open_duration().as_millis() as u64,
            last_transition: self.transitions.read().back().cloned(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.total_admitted.store(0, Ordering::SeqCst);
        self.total_rejected.store(0, Ordering::SeqCst);
        self.total_trips.store(0, Ordering::SeqCst);
        self.total_transitions.store(0, Ordering::SeqCst);
        self.total_open_duration_ms.store(0, Ordering::SeqCst);
        self.current_open_started_at.store(0, Ordering::SeqCst);
        self.transitions.write().clear();
    }
}

/// Serializable metrics for monitoring/display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetricsSnapshot {
    /// Attempts the breaker let through
    pub total_admitted: u64,
    /// Attempts rejected while open or isolated
    pub total_rejected: u64,
    /// Transitions into the open state
    pub total_trips: u64,
    /// All state transitions
    pub total_transitions: u64,
    /// Time spent rejecting attempts (finished periods)
    pub total_open_duration_ms: u64,
    /// Most recent transition, if any
    pub last_transition: Option<StateTransition>,
}

impl std::fmt::Display for CircuitBreakerMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Circuit Breaker Metrics:")?;
        writeln!(f, "  Admitted: {}", self.total_admitted)?;
        writeln!(f, "  Rejected: {}", self.total_rejected)?;
        writeln!(f, "  Trips: {}", self.total_trips)?;
        writeln!(f, "  Total State Transitions: {}", self.total_transitions)?;
        writeln!(f, "  Total Open Duration: {}ms", self.total_open_duration_ms)?;
        if let Some(last) = &self.last_transition {
            writeln!(f, "  Last Transition: {} -> {}", last.from_state, last.to_state)?;
        }
        Ok(())
    }
}
