use async_trait::async_trait;
use bulwark_kernel::{BoxError, Operation};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One scripted invocation.
#[derive(Debug, Clone)]
pub enum Step<T> {
    /// Return the value.
    Return(T),
    /// Raise an error with the message.
    Raise(String),
    /// Sleep, then play the inner step.
    Delay(Duration, Box<Step<T>>),
}

#[derive(Debug)]
struct Script<T> {
    steps: Vec<Step<T>>,
    cursor: usize,
    calls: Vec<Instant>,
}

/// An [`Operation`] that plays a fixed script, one step per invocation.
///
/// Once the script runs out the last step repeats. Clones share the script
/// and the call history, so keep a clone to inspect after handing one to an
/// orchestrator.
#[derive(Debug, Clone)]
pub struct ScriptedOperation<T> {
    script: Arc<Mutex<Script<T>>>,
}

impl<T: Clone + Send + Sync + 'static> ScriptedOperation<T> {
    pub fn new(steps: Vec<Step<T>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                steps,
                cursor: 0,
                calls: Vec::new(),
            })),
        }
    }

    /// Always return `value`.
    pub fn succeeding(value: T) -> Self {
        Self::new(vec![Step::Return(value)])
    }

    /// Always raise `message`.
    pub fn failing(message: &str) -> Self {
        Self::new(vec![Step::Raise(message.to_string())])
    }

    /// Raise `failures` times, then return `value` from then on.
    pub fn fail_then_succeed(failures: usize, value: T) -> Self {
        let mut steps: Vec<Step<T>> = (0..failures)
            .map(|i| Step::Raise(format!("scripted failure {}", i + 1)))
            .collect();
        steps.push(Step::Return(value));
        Self::new(steps)
    }

    /// Return each value in turn, repeating the last one.
    pub fn returning(values: impl IntoIterator<Item = T>) -> Self {
        Self::new(values.into_iter().map(Step::Return).collect())
    }

    /// Sleep `delay` before returning `value`, every time.
    pub fn slow(delay: Duration, value: T) -> Self {
        Self::new(vec![Step::Delay(delay, Box::new(Step::Return(value)))])
    }

    /// Number of times the operation was invoked.
    pub fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }

    /// When each invocation started, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.script.lock().calls.clone()
    }

    /// Gaps between consecutive invocations.
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.call_times();
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn next_step(&self) -> Option<Step<T>> {
        let mut script = self.script.lock();
        script.calls.push(Instant::now());
        let index = script.cursor.min(script.steps.len().checked_sub(1)?);
        script.cursor += 1;
        Some(script.steps[index].clone())
    }
}

async fn play<T>(mut step: Step<T>) -> Result<T, BoxError> {
    loop {
        match step {
            Step::Return(value) => return Ok(value),
            Step::Raise(message) => return Err(message.into()),
            Step::Delay(delay, inner) => {
                tokio::time::sleep(delay).await;
                step = *inner;
            }
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Operation<T> for ScriptedOperation<T> {
    async fn invoke(&self) -> Result<T, BoxError> {
        let Some(step) = self.next_step() else {
            return Err("empty script".into());
        };
        tracing::trace!(call = self.call_count(), "scripted operation invoked");
        play(step).await
    }
}
