//! Per-call execution record.
//!
//! An [`ExecutionContext`] is created fresh for every top-level `execute`
//! call, owned by that call alone and mutated only by the orchestrator. It
//! is handed to hooks by reference and returned to the caller once the call
//! completes, so the final attempt count, elapsed time and full error
//! history are always observable.

use crate::error::AttemptError;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Attempt count, timing, correlation id and error history of one call.
///
/// Invariant: `errors().len() <= attempts()`.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    attempts: u32,
    correlation_id: Uuid,
    start_time: Option<Instant>,
    elapsed: Duration,
    errors: Vec<AttemptError>,
}

impl ExecutionContext {
    /// Create an empty context with a fresh correlation id.
    pub fn new() -> Self {
        Self {
            attempts: 0,
            correlation_id: Uuid::new_v4(),
            start_time: None,
            elapsed: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Identifier tagging this call end to end.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// When the first attempt began, if any attempt has begun.
    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    /// Time between the first attempt and the most recent one settling.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Errors observed so far, in chronological order.
    pub fn errors(&self) -> &[AttemptError] {
        &self.errors
    }

    /// The most recent error, if any.
    pub fn last_error(&self) -> Option<&AttemptError> {
        self.errors.last()
    }

    /// Whether any attempt has failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Record the start time. Only the first call has an effect.
    pub fn mark_started(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
    }

    /// Count a new attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.mark_started();
        self.attempts += 1;
        self.attempts
    }

    /// Append the error of the current attempt.
    pub fn record_error(&mut self, error: AttemptError) {
        debug_assert!(
            (self.errors.len() as u32) < self.attempts,
            "an error must belong to a started attempt"
        );
        self.errors.push(error);
    }

    /// Recompute `elapsed` as now minus the start time.
    pub fn refresh_elapsed(&mut self) {
        if let Some(start) = self.start_time {
            self.elapsed = start.elapsed();
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
