use bulwark_foundation::{ResilientBuilder, RetryPolicyBuilder};
use bulwark_kernel::{CircuitState, ExecutionContext, LifecycleEvent};
use parking_lot::Mutex;
use std::future::{Ready, ready};
use std::sync::Arc;

/// One fired hook and what the context looked like at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRecord {
    pub event: LifecycleEvent,
    pub attempts: u32,
    pub errors: usize,
}

/// Records lifecycle hooks and breaker transitions in firing order.
#[derive(Debug, Clone, Default)]
pub struct HookRecorder {
    records: Arc<Mutex<Vec<HookRecord>>>,
    trips: Arc<Mutex<Vec<(CircuitState, CircuitState)>>>,
}

impl HookRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook closure that records `event`.
    pub fn hook(
        &self,
        event: LifecycleEvent,
    ) -> impl Fn(&ExecutionContext) -> Ready<()> + Send + Sync + 'static {
        let records = Arc::clone(&self.records);
        move |ctx: &ExecutionContext| {
            records.lock().push(HookRecord {
                event,
                attempts: ctx.attempts(),
                errors: ctx.errors().len(),
            });
            ready(())
        }
    }

    /// A breaker `if_tripped` callback that records transitions.
    pub fn trip_hook(&self) -> impl Fn(CircuitState, CircuitState) + Send + Sync + 'static {
        let trips = Arc::clone(&self.trips);
        move |from, to| trips.lock().push((from, to))
    }

    /// Register a recording hook for every orchestrator-level event.
    pub fn attach<T: Send + 'static>(&self, builder: ResilientBuilder<T>) -> ResilientBuilder<T> {
        builder
            .when_entering(self.hook(LifecycleEvent::Entry))
            .when_exiting(self.hook(LifecycleEvent::Exit))
            .if_success(self.hook(LifecycleEvent::Success))
            .if_failure(self.hook(LifecycleEvent::Failure))
            .if_fallback(self.hook(LifecycleEvent::Fallback))
            .if_throttled(self.hook(LifecycleEvent::Throttled))
            .if_timeout(self.hook(LifecycleEvent::Timeout))
    }

    /// Register recording retry and abort hooks on a policy.
    pub fn attach_policy<T>(&self, builder: RetryPolicyBuilder<T>) -> RetryPolicyBuilder<T> {
        builder
            .if_retry(self.hook(LifecycleEvent::Retry))
            .if_abort(self.hook(LifecycleEvent::Abort))
    }

    /// Everything recorded so far.
    pub fn records(&self) -> Vec<HookRecord> {
        self.records.lock().clone()
    }

    /// Recorded events, in order.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.records.lock().iter().map(|r| r.event).collect()
    }

    /// How many times `event` fired.
    pub fn count(&self, event: LifecycleEvent) -> usize {
        self.records.lock().iter().filter(|r| r.event == event).count()
    }

    /// Recorded breaker transitions, in order.
    pub fn trips(&self) -> Vec<(CircuitState, CircuitState)> {
        self.trips.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
        self.trips.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_event_with_context_snapshot() {
        let recorder = HookRecorder::new();
        let hook = recorder.hook(LifecycleEvent::Retry);

        let mut ctx = ExecutionContext::new();
        ctx.begin_attempt();
        hook(&ctx).await;

        assert_eq!(
            recorder.records(),
            vec![HookRecord {
                event: LifecycleEvent::Retry,
                attempts: 1,
                errors: 0,
            }]
        );
    }

    #[test]
    fn records_trips() {
        let recorder = HookRecorder::new();
        let trip = recorder.trip_hook();
        trip(CircuitState::Closed, CircuitState::Open);
        assert_eq!(recorder.trips(), vec![(CircuitState::Closed, CircuitState::Open)]);
        recorder.clear();
        assert!(recorder.trips().is_empty());
    }
}
