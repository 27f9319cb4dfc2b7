//! Fluent configuration for [`Resilient`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bulwark_kernel::validation::{self, FirstError};
use bulwark_kernel::{ConfigError, ExecutionContext, Hook, LifecycleEvent, Operation};

use super::Resilient;
use super::hooks::LifecycleHooks;
use crate::circuit_breaker::CircuitBreaker;
use crate::retry::RetryPolicy;
use crate::throttle::Throttle;

/// Builder for [`Resilient`].
///
/// Every collaborator is optional. Out-of-range arguments are remembered
/// and the first one is reported by [`build`](Self::build).
pub struct ResilientBuilder<T> {
    pub(super) retry: Option<Arc<RetryPolicy<T>>>,
    pub(super) breaker: Option<CircuitBreaker>,
    pub(super) timeout: Option<Duration>,
    pub(super) throttle: Option<Duration>,
    pub(super) fallback: Option<Arc<dyn Operation<T>>>,
    pub(super) hooks: LifecycleHooks,
    errors: FirstError,
}

impl<T: Send + 'static> ResilientBuilder<T> {
    /// Empty configuration: one attempt, no breaker, no timeout.
    pub fn new() -> Self {
        Self {
            retry: None,
            breaker: None,
            timeout: None,
            throttle: None,
            fallback: None,
            hooks: LifecycleHooks::default(),
            errors: FirstError::default(),
        }
    }

    /// Retry according to `policy`.
    pub fn retry_with(self, policy: RetryPolicy<T>) -> Self {
        self.retry_with_shared(Arc::new(policy))
    }

    /// Retry according to a policy shared with other orchestrators.
    pub fn retry_with_shared(mut self, policy: Arc<RetryPolicy<T>>) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Gate every attempt through `breaker`. Clones share its state.
    pub fn short_circuit_with(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Race every attempt against a deadline (`> 0`).
    pub fn timeout_after(mut self, timeout: Duration) -> Self {
        if let Some(timeout) = self.errors.check(validation::positive_duration("timeout_after", timeout)) {
            self.timeout = Some(timeout);
        }
        self
    }

    /// Start at most one invocation per `interval` (`> 0`).
    pub fn throttle(mut self, interval: Duration) -> Self {
        if let Some(interval) = self.errors.check(validation::positive_duration("throttle", interval)) {
            self.throttle = Some(interval);
        }
        self
    }

    /// Operation whose result is returned once attempts run out.
    pub fn fallback_to<O>(mut self, fallback: O) -> Self
    where
        O: Operation<T> + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Hook awaited before the first attempt.
    pub fn when_entering<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(LifecycleEvent::Entry, Hook::new(hook))
    }

    /// Hook awaited right before `execute` returns.
    pub fn when_exiting<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(LifecycleEvent::Exit, Hook::new(hook))
    }

    /// Hook awaited when an attempt's value is accepted.
    pub fn if_success<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(LifecycleEvent::Success, Hook::new(hook))
    }

    /// Hook awaited when the loop ends without an accepted value.
    pub fn if_failure<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(LifecycleEvent::Failure, Hook::new(hook))
    }

    /// Hook awaited before the fallback runs.
    pub fn if_fallback<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(LifecycleEvent::Fallback, Hook::new(hook))
    }

    /// Hook awaited when the throttle defers the call.
    pub fn if_throttled<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(LifecycleEvent::Throttled, Hook::new(hook))
    }

    /// Hook awaited each time an attempt loses its timeout race.
    pub fn if_timeout<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(LifecycleEvent::Timeout, Hook::new(hook))
    }

    /// Register a prepared [`Hook`] for `event`.
    ///
    /// Retry and abort hooks belong to the retry policy and are rejected
    /// here.
    pub fn on(mut self, event: LifecycleEvent, hook: Hook) -> Self {
        match event {
            LifecycleEvent::Retry | LifecycleEvent::Abort => {
                self.errors.check::<()>(Err(ConfigError::invalid_argument(
                    "on",
                    format!("{event} hooks are registered on the retry policy"),
                )));
            }
            _ => self.hooks.set(event, hook),
        }
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<Resilient<T>, ConfigError> {
        self.errors.into_result()?;
        Ok(Resilient {
            retry: self.retry,
            breaker: self.breaker,
            timeout: self.timeout,
            throttle: self.throttle.map(|interval| Arc::new(Throttle::new(interval))),
            fallback: self.fallback,
            hooks: self.hooks,
        })
    }
}

impl<T: Send + 'static> Default for ResilientBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_timeout() {
        let err = ResilientBuilder::<()>::new()
            .timeout_after(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidArgument {
                name: "timeout_after",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_zero_throttle() {
        let err = ResilientBuilder::<()>::new()
            .throttle(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidArgument {
                name: "throttle",
                ..
            }
        ));
    }

    #[test]
    fn test_first_error_wins() {
        let err = ResilientBuilder::<()>::new()
            .throttle(Duration::ZERO)
            .timeout_after(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("throttle"));
    }

    #[test]
    fn test_retry_hooks_are_rejected_here() {
        let result = ResilientBuilder::<()>::new()
            .on(LifecycleEvent::Retry, Hook::from_fn(|_| {}))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_accepts_shared_policy() {
        let policy = Arc::new(RetryPolicy::<u8>::default());
        let resilient = ResilientBuilder::new()
            .retry_with_shared(Arc::clone(&policy))
            .build()
            .unwrap();
        assert_eq!(Arc::strong_count(&policy), 2);
        drop(resilient);
    }
}
