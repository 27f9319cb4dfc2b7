//! Orchestrator-level hook registry.
//!
//! Retry and abort hooks belong to the retry policy; every other lifecycle
//! event is registered here. Firing an event with no hook is a no-op.

use std::collections::HashMap;

use bulwark_kernel::{ExecutionContext, Hook, LifecycleEvent};

#[derive(Debug, Clone, Default)]
pub(crate) struct LifecycleHooks {
    hooks: HashMap<LifecycleEvent, Hook>,
}

impl LifecycleHooks {
    /// Register `hook` for `event`, replacing any previous one.
    pub(crate) fn set(&mut self, event: LifecycleEvent, hook: Hook) {
        self.hooks.insert(event, hook);
    }

    pub(crate) fn contains(&self, event: LifecycleEvent) -> bool {
        self.hooks.contains_key(&event)
    }

    /// Await the hook for `event`, if one is registered.
    pub(crate) async fn fire(&self, event: LifecycleEvent, ctx: &ExecutionContext) {
        if let Some(hook) = self.hooks.get(&event) {
            hook.call(ctx).await;
        }
    }
}
