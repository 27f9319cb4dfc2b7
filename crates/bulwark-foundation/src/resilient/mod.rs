//! Resilient Orchestrator
//!
//! [`Resilient`] wraps an [`Operation`] with any combination of a retry
//! policy, a circuit breaker, a per-attempt timeout, a throttle and a
//! fallback, and fires lifecycle hooks at each transition.
//!
//! # Attempt loop
//!
//! ```text
//! entry
//!   |
//!   v
//! +--> permits another attempt? --no--> failure, exit, [fallback]
//! |       | yes
//! |       v
//! |    (retry) sleep backoff, retry hook
//! |       v
//! |    breaker --rejected--> record error ----------------------+
//! |       v                                                     |
//! |    throttle --deferred (first attempt)--> throttled, exit   |
//! |       |     --busy (retry)--> wait for the window           |
//! |       v                                                     |
//! |    race(operation, timeout) --error--> [timeout], record ---+
//! |       v value                                               |
//! |    abort condition? --yes--> abort, failure, exit, [fallback]
//! |    retry condition? --yes-----------------------------------+
//! |       v                                                     |
//! |    success, close breaker, exit                             |
//! +-------------------------------------------------------------+
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use bulwark_foundation::{BackOff, CircuitBreaker, Resilient, RetryPolicy};
//! use std::time::Duration;
//!
//! let resilient = Resilient::builder()
//!     .retry_with(
//!         RetryPolicy::builder()
//!             .stop_after(4)
//!             .delay_between_retries(Duration::from_millis(50))
//!             .use_back_off(BackOff::Exponential)
//!             .build()?,
//!     )
//!     .short_circuit_with(CircuitBreaker::builder().named("search").build()?)
//!     .timeout_after(Duration::from_secs(2))
//!     .fallback_to(|| async { Ok::<_, BoxError>(Vec::new()) })
//!     .build()?;
//!
//! let execution = resilient.execute(|| async { search("rust").await }).await;
//! println!("{} after {} attempts", execution.disposition, execution.context.attempts());
//! ```

mod builder;
mod execution;
mod hooks;

pub use builder::ResilientBuilder;
pub use execution::{Disposition, Execution};

use std::sync::Arc;
use std::time::Duration;

use bulwark_kernel::{AttemptError, ExecutionContext, LifecycleEvent, Operation};
use futures::future::BoxFuture;
use tracing::{Instrument, debug, info, info_span, warn};

use self::hooks::LifecycleHooks;
use crate::circuit_breaker::CircuitBreaker;
use crate::retry::RetryPolicy;
use crate::throttle::{Admission, Deferred, Throttle};
use crate::timeout;

/// Outcome of one pass through the attempt pipeline.
enum Attempt<T> {
    Settled(Result<T, AttemptError>),
    Throttled,
}

/// Fault-tolerant executor. Immutable once built; `execute` may run
/// concurrently from many tasks.
pub struct Resilient<T> {
    retry: Option<Arc<RetryPolicy<T>>>,
    breaker: Option<CircuitBreaker>,
    timeout: Option<Duration>,
    throttle: Option<Arc<Throttle>>,
    fallback: Option<Arc<dyn Operation<T>>>,
    hooks: LifecycleHooks,
}

impl<T: Send + 'static> Resilient<T> {
    /// Start configuring an orchestrator.
    pub fn builder() -> ResilientBuilder<T> {
        ResilientBuilder::new()
    }

    /// Attached retry policy.
    pub fn retry_policy(&self) -> Option<&RetryPolicy<T>> {
        self.retry.as_deref()
    }

    /// Attached circuit breaker.
    pub fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }

    /// Per-attempt deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Attached throttle.
    pub fn throttle(&self) -> Option<&Throttle> {
        self.throttle.as_deref()
    }

    /// Run `operation` under the configured protections.
    ///
    /// Attempt errors never propagate out of this call: they are collected
    /// in the returned context. A fresh [`ExecutionContext`] is created for
    /// every call.
    pub async fn execute<O>(&self, operation: O) -> Execution<T>
    where
        O: Operation<T> + 'static,
    {
        self.execute_shared(Arc::new(operation)).await
    }

    /// Like [`execute`](Self::execute) for an operation that is already
    /// shared.
    pub async fn execute_shared(&self, operation: Arc<dyn Operation<T>>) -> Execution<T> {
        let ctx = ExecutionContext::new();
        let span = info_span!("resilient.execute", correlation_id = %ctx.correlation_id());
        self.drive(operation, ctx).instrument(span).await
    }

    fn permits_attempt(&self, attempts: u32) -> bool {
        match &self.retry {
            Some(policy) => policy.permits_attempt(attempts),
            None => attempts < 1,
        }
    }

    async fn drive(&self, operation: Arc<dyn Operation<T>>, mut ctx: ExecutionContext) -> Execution<T> {
        self.hooks.fire(LifecycleEvent::Entry, &ctx).await;

        let mut aborted = false;
        while self.permits_attempt(ctx.attempts()) {
            if ctx.attempts() > 0 {
                self.before_retry(&ctx).await;
            }

            let attempt = ctx.begin_attempt();
            let outcome = self
                .attempt(&operation, attempt > 1)
                .instrument(info_span!("resilient.attempt", attempt))
                .await;
            ctx.refresh_elapsed();

            match outcome {
                Attempt::Throttled => {
                    debug!(attempt, "call deferred by throttle");
                    self.hooks.fire(LifecycleEvent::Throttled, &ctx).await;
                    self.hooks.fire(LifecycleEvent::Exit, &ctx).await;
                    return Execution::new(None, Disposition::Throttled, ctx);
                }
                Attempt::Settled(Ok(value)) => {
                    if let Some(policy) = &self.retry {
                        if policy.can_abort_if(&value) {
                            warn!(attempt, "value matched an abort condition");
                            policy.on_abort(&ctx).await;
                            aborted = true;
                            break;
                        }
                        if policy.can_retry_if(&value) {
                            debug!(attempt, "value matched a retry condition");
                            continue;
                        }
                    }

                    if attempt > 1 {
                        info!(attempts = attempt, "operation succeeded after retry");
                    }
                    self.hooks.fire(LifecycleEvent::Success, &ctx).await;
                    if let Some(breaker) = &self.breaker {
                        breaker.close();
                    }
                    self.hooks.fire(LifecycleEvent::Exit, &ctx).await;
                    return Execution::new(Some(value), Disposition::Succeeded, ctx);
                }
                Attempt::Settled(Err(err)) => {
                    if let AttemptError::TimedOut(after) = &err {
                        warn!(attempt, timeout_ms = after.as_millis() as u64, "attempt timed out");
                        self.hooks.fire(LifecycleEvent::Timeout, &ctx).await;
                    } else {
                        debug!(attempt, error = %err, "attempt failed");
                    }
                    ctx.record_error(err);
                    ctx.refresh_elapsed();
                }
            }
        }

        self.conclude(ctx, aborted).await
    }

    /// Backoff sleep followed by the retry hook.
    async fn before_retry(&self, ctx: &ExecutionContext) {
        let Some(policy) = &self.retry else {
            return;
        };

        let delay = policy.delay_for(ctx.attempts());
        if delay.is_zero() {
            // keep unbounded loops against an open breaker from starving the runtime
            tokio::task::yield_now().await;
        } else {
            debug!(
                attempts = ctx.attempts(),
                delay_ms = delay.as_millis() as u64,
                backoff = %policy.backoff(),
                "backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }
        policy.on_retry(ctx).await;
    }

    /// Breaker gate, throttle admission, then the timeout race.
    ///
    /// A rejected attempt never touches the throttle window. The first
    /// attempt of a call is deferred when the window is busy; retries wait
    /// for the window instead.
    async fn attempt(&self, operation: &Arc<dyn Operation<T>>, retrying: bool) -> Attempt<T> {
        if let Some(breaker) = &self.breaker {
            if let Err(rejected) = breaker.execute() {
                return Attempt::Settled(Err(rejected));
            }
        }

        if let Some(throttle) = &self.throttle {
            if retrying {
                throttle.acquire().await;
            } else {
                let trailing = trailing_run(Arc::clone(operation), self.breaker.clone());
                if throttle.admit(trailing) == Admission::Deferred {
                    if let Some(breaker) = &self.breaker {
                        breaker.release();
                    }
                    return Attempt::Throttled;
                }
            }
        }

        let operation = Arc::clone(operation);
        Attempt::Settled(timeout::race(async move { operation.invoke().await }, self.timeout).await)
    }

    /// Failure path: failure and exit hooks, then the fallback.
    async fn conclude(&self, ctx: ExecutionContext, aborted: bool) -> Execution<T> {
        warn!(
            attempts = ctx.attempts(),
            errors = ctx.errors().len(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            aborted,
            "execution ended without success"
        );
        self.hooks.fire(LifecycleEvent::Failure, &ctx).await;
        self.hooks.fire(LifecycleEvent::Exit, &ctx).await;

        let Some(fallback) = &self.fallback else {
            let disposition = if aborted {
                Disposition::Aborted
            } else {
                Disposition::Exhausted
            };
            return Execution::new(None, disposition, ctx);
        };

        self.hooks.fire(LifecycleEvent::Fallback, &ctx).await;
        match fallback.invoke().await {
            Ok(value) => Execution::new(Some(value), Disposition::FellBack, ctx),
            Err(err) => {
                let err = AttemptError::operation(err);
                warn!(error = %err, "fallback failed");
                let mut execution = Execution::new(None, Disposition::FallbackFailed, ctx);
                execution.fallback_error = Some(err);
                execution
            }
        }
    }
}

impl<T> std::fmt::Debug for Resilient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resilient")
            .field("retry", &self.retry)
            .field("breaker", &self.breaker)
            .field("timeout", &self.timeout)
            .field("throttle", &self.throttle)
            .field("fallback", &self.fallback.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Deferred invocation handed to the throttle. It passes the breaker gate
/// when the trailing edge arrives; its outcome is only logged.
fn trailing_run<T: Send + 'static>(
    operation: Arc<dyn Operation<T>>,
    breaker: Option<CircuitBreaker>,
) -> Deferred {
    Box::new(move || -> Option<BoxFuture<'static, ()>> {
        if let Some(breaker) = &breaker {
            if let Err(rejected) = breaker.execute() {
                debug!(error = %rejected, "trailing invocation rejected");
                return None;
            }
        }
        let run: BoxFuture<'static, ()> = Box::pin(async move {
            match operation.invoke().await {
                Ok(_) => {
                    if let Some(breaker) = &breaker {
                        breaker.close();
                    }
                }
                Err(err) => debug!(error = %err, "trailing invocation failed"),
            }
        });
        Some(run)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_kernel::BoxError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test]
    async fn test_single_attempt_without_policy() {
        let calls = counter();
        let seen = Arc::clone(&calls);
        let resilient = Resilient::<u32>::builder().build().unwrap();

        let execution = resilient
            .execute(move || {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, BoxError>("down".into())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(execution.disposition, Disposition::Exhausted);
        assert_eq!(execution.context.attempts(), 1);
        assert_eq!(execution.context.errors().len(), 1);
        assert!(execution.value.is_none());
    }

    #[tokio::test]
    async fn test_success_returns_value() {
        let resilient = Resilient::<&str>::builder().build().unwrap();
        let execution = resilient.execute(|| async { Ok::<_, BoxError>("ok") }).await;

        assert!(execution.is_success());
        assert_eq!(execution.value(), Some(&"ok"));
        assert!(!execution.context.has_errors());
    }

    #[tokio::test]
    async fn test_forced_retry_then_accept() {
        let calls = counter();
        let seen = Arc::clone(&calls);
        let resilient = Resilient::builder()
            .retry_with(RetryPolicy::<u32>::builder().stop_after(5).retry_if(0).build().unwrap())
            .build()
            .unwrap();

        let execution = resilient
            .execute(move || {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<u32, BoxError>(if n < 2 { 0 } else { 42 }) }
            })
            .await;

        assert_eq!(execution.into_value(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_forced_retry_exhausts_without_errors() {
        let resilient = Resilient::builder()
            .retry_with(RetryPolicy::<i32>::builder().stop_after(3).retry_if(-1).build().unwrap())
            .build()
            .unwrap();

        let execution = resilient.execute(|| async { Ok::<i32, BoxError>(-1) }).await;
        assert_eq!(execution.disposition, Disposition::Exhausted);
        assert_eq!(execution.context.attempts(), 3);
        assert!(execution.context.errors().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_error_is_reported() {
        let resilient = Resilient::<u8>::builder()
            .fallback_to(|| async { Err::<u8, BoxError>("fallback down".into()) })
            .build()
            .unwrap();

        let execution = resilient.execute(|| async { Err::<u8, BoxError>("down".into()) }).await;
        assert_eq!(execution.disposition, Disposition::FallbackFailed);
        assert!(execution.value.is_none());
        assert!(
            execution
                .fallback_error
                .unwrap()
                .to_string()
                .contains("fallback down")
        );
        assert_eq!(execution.context.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_contexts_are_fresh_per_call() {
        let resilient = Resilient::<i32>::builder().build().unwrap();
        let first = resilient.execute(|| async { Ok::<_, BoxError>(1) }).await;
        let second = resilient.execute(|| async { Ok::<_, BoxError>(2) }).await;

        assert_ne!(first.context.correlation_id(), second.context.correlation_id());
        assert_eq!(second.context.attempts(), 1);
    }

    #[test]
    fn test_resilient_is_send_sync() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Resilient<String>>();
    }
}
