//! Lifecycle hooks.
//!
//! A [`Hook`] is an optional callback fired at one point of the execution
//! lifecycle. It receives the execution context by reference and returns a
//! future that the orchestrator awaits before moving on, so a hook that
//! suspends still completes before the next transition.
//!
//! Because the returned future must be `'static`, copy what you need out of
//! the context before the `async` block:
//!
//! ```rust,ignore
//! use bulwark_kernel::hooks::Hook;
//!
//! let hook = Hook::new(|ctx| {
//!     let attempts = ctx.attempts();
//!     async move { tracing::info!(attempts, "retrying") }
//! });
//! ```

use crate::context::ExecutionContext;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type HookFn = dyn Fn(&ExecutionContext) -> BoxFuture<'static, ()> + Send + Sync;

/// An awaitable lifecycle callback.
#[derive(Clone)]
pub struct Hook {
    inner: Arc<HookFn>,
}

impl Hook {
    /// Wrap an async callback.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |ctx: &ExecutionContext| -> BoxFuture<'static, ()> {
                Box::pin(f(ctx))
            }),
        }
    }

    /// Wrap a synchronous callback.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) + Send + Sync + 'static,
    {
        Self::new(move |ctx| {
            f(ctx);
            std::future::ready(())
        })
    }

    /// Invoke the hook and wait for it to finish.
    pub async fn call(&self, ctx: &ExecutionContext) {
        (self.inner)(ctx).await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

/// Points of the execution lifecycle at which hooks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Before the first attempt.
    Entry,
    /// An attempt completed and its value was accepted.
    Success,
    /// The loop ended without an accepted value.
    Failure,
    /// Before a retry's attempt starts.
    Retry,
    /// A value matched an abort condition.
    Abort,
    /// The call was deferred by the throttle.
    Throttled,
    /// An attempt lost its timeout race.
    Timeout,
    /// The fallback operation is about to run.
    Fallback,
    /// The call is about to return.
    Exit,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entry => "entry",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Retry => "retry",
            Self::Abort => "abort",
            Self::Throttled => "throttled",
            Self::Timeout => "timeout",
            Self::Fallback => "fallback",
            Self::Exit => "exit",
        };
        f.write_str(name)
    }
}
