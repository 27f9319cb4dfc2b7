//! Retry decision object.
//!
//! A [`RetryPolicy`] never runs anything itself. Given a settled value it
//! says whether to abort or force a retry, it bounds the number of attempts
//! and it computes the delay before the next one. Once built it is
//! read-only and may be shared between orchestrators behind an [`Arc`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bulwark_kernel::validation::{self, FirstError};
use bulwark_kernel::{ConfigError, ExecutionContext, Hook};

use super::backoff::BackOff;

/// `max_attempts` value meaning "retry until something else stops the loop".
pub const UNBOUNDED: u32 = 0;

/// Attempts allowed when the builder is not told otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Attempt bound, backoff and value classification for the retry loop.
pub struct RetryPolicy<T> {
    max_attempts: u32,
    delay: Duration,
    backoff: BackOff,
    abort_conditions: Vec<Predicate<T>>,
    retry_conditions: Vec<Predicate<T>>,
    on_retry: Option<Hook>,
    on_abort: Option<Hook>,
}

impl<T> RetryPolicy<T> {
    /// Start configuring a policy.
    pub fn builder() -> RetryPolicyBuilder<T> {
        RetryPolicyBuilder::new()
    }

    /// Attempt bound, [`UNBOUNDED`] for no bound.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether the attempt bound is disabled.
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == UNBOUNDED
    }

    /// Base delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Backoff strategy applied to the base delay.
    pub fn backoff(&self) -> BackOff {
        self.backoff
    }

    /// Whether another attempt may start after `attempts` have been made.
    pub fn permits_attempt(&self, attempts: u32) -> bool {
        self.is_unbounded() || attempts < self.max_attempts
    }

    /// Whether `value` matches any abort condition.
    pub fn can_abort_if(&self, value: &T) -> bool {
        self.abort_conditions.iter().any(|matches| matches(value))
    }

    /// Whether `value` matches any retry condition.
    pub fn can_retry_if(&self, value: &T) -> bool {
        self.retry_conditions.iter().any(|matches| matches(value))
    }

    /// Delay before the retry that follows `attempts` completed attempts.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        self.backoff.delay(attempts, self.delay)
    }

    /// Fire the retry hook, if any.
    pub async fn on_retry(&self, ctx: &ExecutionContext) {
        if let Some(hook) = &self.on_retry {
            hook.call(ctx).await;
        }
    }

    /// Fire the abort hook, if any.
    pub async fn on_abort(&self, ctx: &ExecutionContext) {
        if let Some(hook) = &self.on_abort {
            hook.call(ctx).await;
        }
    }
}

impl<T> Default for RetryPolicy<T> {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
            backoff: BackOff::Static,
            abort_conditions: Vec::new(),
            retry_conditions: Vec::new(),
            on_retry: None,
            on_abort: None,
        }
    }
}

impl<T> Clone for RetryPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            delay: self.delay,
            backoff: self.backoff,
            abort_conditions: self.abort_conditions.clone(),
            retry_conditions: self.retry_conditions.clone(),
            on_retry: self.on_retry.clone(),
            on_abort: self.on_abort.clone(),
        }
    }
}

impl<T> fmt::Debug for RetryPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("backoff", &self.backoff)
            .field("abort_conditions", &self.abort_conditions.len())
            .field("retry_conditions", &self.retry_conditions.len())
            .field("on_retry", &self.on_retry.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .finish()
    }
}

/// Fluent builder for [`RetryPolicy`].
///
/// ```rust,ignore
/// let policy = RetryPolicy::<u16>::builder()
///     .stop_after(5)
///     .delay_between_retries(Duration::from_millis(200))
///     .use_back_off(BackOff::Linear)
///     .retry_if(503)
///     .abort_if(401)
///     .if_retry(|ctx| {
///         let attempts = ctx.attempts();
///         async move { tracing::debug!(attempts, "retrying") }
///     })
///     .build()?;
/// ```
pub struct RetryPolicyBuilder<T> {
    policy: RetryPolicy<T>,
    errors: FirstError,
}

impl<T> RetryPolicyBuilder<T> {
    /// Start from the defaults: three attempts, no delay, static backoff.
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            errors: FirstError::default(),
        }
    }

    /// Allow at most `n` attempts in total (`n > 0`).
    pub fn stop_after(mut self, n: u32) -> Self {
        if let Some(n) = self.errors.check(validation::positive_count("stop_after", n)) {
            self.policy.max_attempts = n;
        }
        self
    }

    /// Never stop on the attempt count alone.
    pub fn retry_forever(mut self) -> Self {
        self.policy.max_attempts = UNBOUNDED;
        self
    }

    /// Base delay between attempts.
    pub fn delay_between_retries(mut self, delay: Duration) -> Self {
        self.policy.delay = delay;
        self
    }

    /// Growth strategy for the delay.
    pub fn use_back_off(mut self, backoff: BackOff) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Retry whenever the operation returns `value`.
    pub fn retry_if(self, value: T) -> Self
    where
        T: PartialEq + Send + Sync + 'static,
    {
        self.retry_when(move |candidate| *candidate == value)
    }

    /// Abort whenever the operation returns `value`.
    pub fn abort_if(self, value: T) -> Self
    where
        T: PartialEq + Send + Sync + 'static,
    {
        self.abort_when(move |candidate| *candidate == value)
    }

    /// Retry whenever `predicate` holds for the returned value.
    pub fn retry_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.policy.retry_conditions.push(Arc::new(predicate));
        self
    }

    /// Abort whenever `predicate` holds for the returned value.
    pub fn abort_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.policy.abort_conditions.push(Arc::new(predicate));
        self
    }

    /// Hook awaited before every retry's attempt.
    pub fn if_retry<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.policy.on_retry = Some(Hook::new(hook));
        self
    }

    /// Hook awaited when a value matches an abort condition.
    pub fn if_abort<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.policy.on_abort = Some(Hook::new(hook));
        self
    }

    /// Validate and freeze the policy.
    pub fn build(self) -> Result<RetryPolicy<T>, ConfigError> {
        self.errors.into_result()?;
        Ok(self.policy)
    }
}

impl<T> Default for RetryPolicyBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
