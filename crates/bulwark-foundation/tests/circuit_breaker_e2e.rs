//! Circuit breaker behaviour observed through the orchestrator.
//!
//! ```bash
//! cargo test -p bulwark-foundation --test circuit_breaker_e2e
//! ```

use std::sync::Arc;
use std::time::Duration;

use bulwark_foundation::{
    AttemptError, CircuitBreaker, CircuitState, Disposition, Resilient, RetryPolicy,
};
use bulwark_testing::{HookRecorder, ScriptedOperation};

use CircuitState::*;

fn breaker(recorder: &HookRecorder, threshold: u32, reset: Duration) -> CircuitBreaker {
    CircuitBreaker::builder()
        .named("e2e")
        .open_circuit_after(threshold)
        .reset_after(reset)
        .if_tripped(recorder.trip_hook())
        .build()
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// § 1  Closed → Open
// ─────────────────────────────────────────────────────────────────────────────

/// Once the fault counter passes the threshold the breaker opens and later
/// attempts are rejected without invoking the operation.
#[tokio::test(start_paused = true)]
async fn opens_after_threshold_and_short_circuits() {
    let recorder = HookRecorder::new();
    let cb = breaker(&recorder, 2, Duration::from_secs(1));
    let resilient = Resilient::<u32>::builder()
        .short_circuit_with(cb.clone())
        .build()
        .unwrap();
    let op = ScriptedOperation::<u32>::failing("down");

    resilient.execute(op.clone()).await;
    resilient.execute(op.clone()).await;
    assert_eq!(cb.state(), Closed);

    let rejected = resilient.execute(op.clone()).await;
    assert_eq!(cb.state(), Open);
    assert_eq!(op.call_count(), 2);
    assert!(matches!(
        rejected.context.last_error(),
        Some(AttemptError::CircuitOpen { state: Open, .. })
    ));

    resilient.execute(op.clone()).await;
    assert_eq!(op.call_count(), 2);
    assert_eq!(recorder.trips(), vec![(Closed, Open)]);
}

/// Within a single execution, retries against an open breaker keep being
/// rejected and are recorded as errors.
#[tokio::test(start_paused = true)]
async fn retries_are_rejected_while_open() {
    let recorder = HookRecorder::new();
    let cb = breaker(&recorder, 1, Duration::from_secs(60));
    let resilient = Resilient::<u32>::builder()
        .retry_with(RetryPolicy::builder().stop_after(4).build().unwrap())
        .short_circuit_with(cb.clone())
        .build()
        .unwrap();
    let op = ScriptedOperation::<u32>::failing("down");

    let execution = resilient.execute(op.clone()).await;

    assert_eq!(op.call_count(), 1);
    assert_eq!(execution.context.attempts(), 4);
    assert_eq!(execution.context.errors().len(), 4);
    assert_eq!(
        execution
            .context
            .errors()
            .iter()
            .filter(|e| e.is_circuit_open())
            .count(),
        3
    );
    assert_eq!(cb.metrics().total_rejected(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// § 2  Open → HalfOpen → Closed / Open
// ─────────────────────────────────────────────────────────────────────────────

/// After the cooldown one probe is admitted; its success closes the circuit.
#[tokio::test(start_paused = true)]
async fn successful_probe_closes_circuit() {
    let recorder = HookRecorder::new();
    let cb = breaker(&recorder, 1, Duration::from_millis(500));
    let resilient = Resilient::<u32>::builder()
        .short_circuit_with(cb.clone())
        .build()
        .unwrap();

    resilient.execute(ScriptedOperation::<u32>::failing("down")).await;
    resilient.execute(ScriptedOperation::<u32>::failing("down")).await;
    assert_eq!(cb.state(), Open);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(cb.state(), HalfOpen);

    let probe = resilient.execute(ScriptedOperation::succeeding(1)).await;
    assert_eq!(probe.disposition, Disposition::Succeeded);
    assert_eq!(cb.state(), Closed);
    assert_eq!(cb.attempts(), 0);
    assert_eq!(recorder.trips(), vec![(Closed, Open), (Open, HalfOpen), (HalfOpen, Closed)]);
}

/// A failing probe sends the circuit back to open on the next attempt.
#[tokio::test(start_paused = true)]
async fn failing_probe_reopens_circuit() {
    let recorder = HookRecorder::new();
    let cb = breaker(&recorder, 2, Duration::from_millis(500));
    let resilient = Resilient::<u32>::builder()
        .retry_with(RetryPolicy::builder().stop_after(2).build().unwrap())
        .short_circuit_with(cb.clone())
        .build()
        .unwrap();

    cb.open();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(cb.state(), HalfOpen);

    let op = ScriptedOperation::<u32>::failing("still down");
    let execution = resilient.execute(op.clone()).await;

    assert_eq!(op.call_count(), 1);
    assert_eq!(execution.context.attempts(), 2);
    assert_eq!(cb.state(), Open);
    assert_eq!(recorder.trips(), vec![(Closed, Open), (Open, HalfOpen), (HalfOpen, Open)]);
}

// ─────────────────────────────────────────────────────────────────────────────
// § 3  Isolation and sharing
// ─────────────────────────────────────────────────────────────────────────────

/// An isolated breaker rejects every attempt until closed, and no timer
/// moves it.
#[tokio::test(start_paused = true)]
async fn isolated_breaker_rejects_until_closed() {
    let recorder = HookRecorder::new();
    let cb = breaker(&recorder, 5, Duration::from_millis(100));
    let resilient = Resilient::<u32>::builder()
        .short_circuit_with(cb.clone())
        .build()
        .unwrap();
    let op = ScriptedOperation::succeeding(7);

    cb.isolate();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let rejected = resilient.execute(op.clone()).await;
    assert!(rejected.value.is_none());
    assert!(matches!(
        rejected.context.last_error(),
        Some(AttemptError::CircuitOpen { state: Isolated, .. })
    ));
    assert_eq!(op.call_count(), 0);

    cb.close();
    let admitted = resilient.execute(op.clone()).await;
    assert_eq!(admitted.value, Some(7));
}

/// Two orchestrators attached to one breaker see the same state.
#[tokio::test(start_paused = true)]
async fn breaker_state_is_shared_between_orchestrators() {
    let recorder = HookRecorder::new();
    let cb = breaker(&recorder, 1, Duration::from_secs(30));
    let left = Resilient::<u32>::builder().short_circuit_with(cb.clone()).build().unwrap();
    let right = Resilient::<u32>::builder().short_circuit_with(cb.clone()).build().unwrap();

    left.execute(ScriptedOperation::<u32>::failing("down")).await;
    left.execute(ScriptedOperation::<u32>::failing("down")).await;

    let op = ScriptedOperation::succeeding(1);
    let execution = right.execute(op.clone()).await;
    assert!(execution.value.is_none());
    assert_eq!(op.call_count(), 0);
}

/// Concurrent executions against one breaker trip it exactly once and never
/// admit more attempts than the threshold.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_trip_once() {
    let recorder = HookRecorder::new();
    let cb = breaker(&recorder, 5, Duration::from_secs(60));
    let resilient = Arc::new(
        Resilient::<u32>::builder()
            .short_circuit_with(cb.clone())
            .build()
            .unwrap(),
    );
    let op = ScriptedOperation::<u32>::failing("down");

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let resilient = Arc::clone(&resilient);
            let op = op.clone();
            tokio::spawn(async move { resilient.execute(op).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(op.call_count(), 5);
    assert_eq!(cb.metrics().total_trips(), 1);
    assert_eq!(cb.metrics().total_admitted(), 5);
    assert_eq!(recorder.trips(), vec![(Closed, Open)]);
}
