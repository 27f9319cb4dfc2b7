//! Circuit Breaker State Machine
//!
//! A [`CircuitBreaker`] is a cheap-to-clone handle over state shared by
//! every orchestrator it is attached to. All reads and writes of the fault
//! counter and every transition happen under one mutex, so the threshold
//! check and the half-open admission are atomic with respect to the counter
//! they read. The `on_trip` callback runs after the lock is released.
//!
//! The reset timer started by [`CircuitBreaker::open`] is a tokio task tied
//! to the breaker (it holds only a weak reference), not to any execution.
//! Each transition bumps a generation number; a timer whose generation is
//! stale does nothing when it fires. When no tokio runtime is available the
//! open-to-half-open move is observed lazily once `reset_timeout` elapsed.

use std::sync::{Arc, Weak};

use bulwark_kernel::{AttemptError, CircuitState};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{CircuitBreakerBuilder, CircuitBreakerConfig};
use super::metrics::{CircuitBreakerMetrics, StateTransition};

/// Callback fired on every state change with `(from, to)`.
pub type TripHook = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Fault counter since the circuit last closed
    attempts: u32,
    opened_at: Option<Instant>,
    reset_timer: Option<JoinHandle<()>>,
    generation: u64,
}

struct Shared {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    on_trip: Option<TripHook>,
    metrics: CircuitBreakerMetrics,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.get_mut().reset_timer.take() {
            timer.abort();
        }
    }
}

/// Circuit breaker shared across executions.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Start configuring a breaker.
    pub fn builder() -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new()
    }

    /// Create a breaker from a configuration, validating it first.
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, bulwark_kernel::ConfigError> {
        CircuitBreakerBuilder::from_config(config).build()
    }

    pub(crate) fn from_parts(config: CircuitBreakerConfig, on_trip: Option<TripHook>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    state: CircuitState::Closed,
                    attempts: 0,
                    opened_at: None,
                    reset_timer: None,
                    generation: 0,
                }),
                on_trip,
                metrics: CircuitBreakerMetrics::new(),
            }),
        }
    }

    /// Gate one attempt.
    ///
    /// Open or isolated circuits reject without touching the fault counter.
    /// Otherwise the counter is incremented; if it now exceeds the threshold
    /// the circuit opens and this attempt is rejected too. The orchestrator
    /// must call [`close`](Self::close) after a success, otherwise sustained
    /// traffic alone trips the breaker.
    pub fn execute(&self) -> Result<(), AttemptError> {
        let mut changes = Vec::new();
        let verdict = {
            let mut inner = self.shared.inner.lock();
            changes.extend(self.promote_if_cooled(&mut inner));

            if inner.state.rejects() {
                Err(inner.state)
            } else {
                inner.attempts += 1;
                if inner.attempts > self.shared.config.failure_threshold {
                    warn!(
                        breaker = %self.shared.config.name,
                        attempts = inner.attempts,
                        threshold = self.shared.config.failure_threshold,
                        "fault threshold exceeded, opening circuit"
                    );
                    changes.extend(self.transition_locked(&mut inner, CircuitState::Open));
                    Err(CircuitState::Open)
                } else {
                    Ok(())
                }
            }
        };

        for change in changes {
            self.notify(Some(change));
        }

        match verdict {
            Ok(()) => {
                self.shared.metrics.record_admitted();
                Ok(())
            }
            Err(state) => {
                self.shared.metrics.record_rejected();
                debug!(breaker = %self.shared.config.name, %state, "attempt rejected");
                Err(AttemptError::CircuitOpen {
                    name: self.shared.config.name.clone(),
                    state,
                })
            }
        }
    }

    /// Hand back an admission from [`execute`](Self::execute) whose
    /// operation never ran, undoing its effect on the fault counter.
    ///
    /// A half-open circuit keeps its probe available.
    pub fn release(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state.rejects() || inner.attempts == 0 {
                return;
            }
            inner.attempts -= 1;
        }
        self.shared.metrics.record_released();
    }

    /// Force the closed state: clear the counter, the timer and the open
    /// timestamp.
    pub fn close(&self) {
        self.transition_to(CircuitState::Closed);
    }

    /// Force the open state and start the reset timer.
    pub fn open(&self) {
        self.transition_to(CircuitState::Open);
    }

    /// Force the isolated state. Only [`close`](Self::close) recovers it.
    pub fn isolate(&self) {
        self.transition_to(CircuitState::Isolated);
    }

    /// Current state, promoting an open circuit whose cooldown elapsed.
    pub fn state(&self) -> CircuitState {
        let (state, change) = {
            let mut inner = self.shared.inner.lock();
            let change = self.promote_if_cooled(&mut inner);
            (inner.state, change)
        };
        self.notify(change);
        state
    }

    /// Fault counter since the circuit last closed.
    pub fn attempts(&self) -> u32 {
        self.shared.inner.lock().attempts
    }

    /// When the circuit last opened, if it is open.
    pub fn opened_at(&self) -> Option<Instant> {
        self.shared.inner.lock().opened_at
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Static configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.shared.config
    }

    /// Metrics.
    pub fn metrics(&self) -> &CircuitBreakerMetrics {
        &self.shared.metrics
    }

    fn transition_to(&self, to: CircuitState) {
        let change = {
            let mut inner = self.shared.inner.lock();
            self.transition_locked(&mut inner, to)
        };
        self.notify(change);
    }

    /// The single place where the state changes. Re-entering the current
    /// state is a no-op.
    fn transition_locked(
        &self,
        inner: &mut Inner,
        to: CircuitState,
    ) -> Option<(CircuitState, CircuitState)> {
        if inner.state == to {
            return None;
        }

        let from = inner.state;
        inner.state = to;
        inner.generation = inner.generation.wrapping_add(1);
        if let Some(timer) = inner.reset_timer.take() {
            timer.abort();
        }

        match to {
            CircuitState::Closed => {
                inner.attempts = 0;
                inner.opened_at = None;
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                inner.reset_timer = self.schedule_reset(inner.generation);
            }
            CircuitState::HalfOpen => {
                inner.attempts = self.shared.config.failure_threshold.saturating_sub(1);
            }
            CircuitState::Isolated => {}
        }

        self.shared
            .metrics
            .record_transition(StateTransition::new(from, to));
        Some((from, to))
    }

    fn promote_if_cooled(&self, inner: &mut Inner) -> Option<(CircuitState, CircuitState)> {
        let cooled = inner.state == CircuitState::Open
            && inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.shared.config.reset_timeout);
        if cooled {
            self.transition_locked(inner, CircuitState::HalfOpen)
        } else {
            None
        }
    }

    fn schedule_reset(&self, generation: u64) -> Option<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let breaker: Weak<Shared> = Arc::downgrade(&self.shared);
        let cooldown = self.shared.config.reset_timeout;

        Some(runtime.spawn(async move {
            tokio::time::sleep(cooldown).await;
            if let Some(shared) = breaker.upgrade() {
                CircuitBreaker { shared }.fire_reset(generation);
            }
        }))
    }

    fn fire_reset(&self, generation: u64) {
        let change = {
            let mut inner = self.shared.inner.lock();
            if inner.generation != generation || inner.state != CircuitState::Open {
                return;
            }
            // Detach our own handle instead of aborting it.
            inner.reset_timer = None;
            self.transition_locked(&mut inner, CircuitState::HalfOpen)
        };
        self.notify(change);
    }

    fn notify(&self, change: Option<(CircuitState, CircuitState)>) {
        let Some((from, to)) = change else {
            return;
        };
        info!(breaker = %self.shared.config.name, %from, %to, "circuit breaker transition");
        if let Some(on_trip) = &self.shared.on_trip {
            on_trip(from, to);
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.config.name)
            .field("state", &inner.state)
            .field("attempts", &inner.attempts)
            .finish()
    }
}
