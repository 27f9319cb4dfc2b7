//! Invocation-rate limiter owned by one orchestrator.
//!
//! At most one invocation starts per `interval`:
//!
//! - a call arriving when the window is free runs immediately and stamps
//!   the window (leading edge);
//! - a call arriving inside the window is deferred. Deferred calls coalesce:
//!   only the most recent one is kept and it runs once, in the background,
//!   when the window ends (trailing edge). The trailing run stamps a new
//!   window unless the deferred work declines to run;
//! - [`Throttle::acquire`] waits for a free window instead of deferring.
//!
//! The admission decision and the pending slot live behind one mutex.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Work run on the trailing edge. Returning `None` declines the run and
/// leaves the window unstamped. The outcome of the future is not observed.
pub type Deferred = Box<dyn FnOnce() -> Option<BoxFuture<'static, ()>> + Send>;

/// Result of asking the throttle for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run now.
    Run,
    /// Deferred to the trailing edge of the current window.
    Deferred,
}

#[derive(Default)]
struct Window {
    last_run: Option<Instant>,
    pending: Option<Deferred>,
    trailing_scheduled: bool,
}

impl Window {
    fn is_free(&self, now: Instant, interval: Duration) -> bool {
        !self.trailing_scheduled
            && self
                .last_run
                .is_none_or(|last| now.duration_since(last) >= interval)
    }
}

/// Leading-edge throttle with one coalesced trailing run.
pub struct Throttle {
    interval: Duration,
    window: Arc<Mutex<Window>>,
}

impl Throttle {
    /// Create a throttle admitting one invocation per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window: Arc::new(Mutex::new(Window::default())),
        }
    }

    /// Minimum spacing between invocations.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the last invocation (leading or trailing) started.
    pub fn last_run(&self) -> Option<Instant> {
        self.window.lock().last_run
    }

    /// Whether a trailing run is waiting for the window to end.
    pub fn has_pending(&self) -> bool {
        self.window.lock().trailing_scheduled
    }

    /// Ask for a slot.
    ///
    /// On [`Admission::Deferred`], `deferred` replaces any previously
    /// deferred work and will run at the end of the window.
    pub fn admit(&self, deferred: Deferred) -> Admission {
        let now = Instant::now();
        let mut window = self.window.lock();

        if window.is_free(now, self.interval) {
            window.last_run = Some(now);
            return Admission::Run;
        }

        window.pending = Some(deferred);
        if !window.trailing_scheduled {
            let last = window.last_run.unwrap_or(now);
            window.trailing_scheduled =
                schedule_trailing(&self.window, last + self.interval, self.interval);
        }
        Admission::Deferred
    }

    /// Wait until the window is free, then stamp it.
    ///
    /// Pending trailing work keeps its turn: a waiter never starts before
    /// a scheduled trailing run.
    pub async fn acquire(&self) {
        loop {
            let wake_at = {
                let now = Instant::now();
                let mut window = self.window.lock();
                if window.is_free(now, self.interval) {
                    window.last_run = Some(now);
                    return;
                }
                let next = window.last_run.map_or(now, |last| last + self.interval);
                (next > now).then_some(next)
            };
            match wake_at {
                Some(at) => tokio::time::sleep_until(at).await,
                // the trailing run is due but has not stamped the window yet
                None => tokio::task::yield_now().await,
            }
        }
    }
}

fn schedule_trailing(window: &Arc<Mutex<Window>>, at: Instant, interval: Duration) -> bool {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        return false;
    };
    let window: Weak<Mutex<Window>> = Arc::downgrade(window);

    runtime.spawn(async move {
        tokio::time::sleep_until(at).await;
        let Some(window) = window.upgrade() else {
            return;
        };

        // trailing_scheduled stays set while the work decides, so no
        // leading call slips in between.
        let work = window.lock().pending.take();
        let run = work.and_then(|work| work());

        {
            let mut guard = window.lock();
            guard.trailing_scheduled = false;
            if run.is_some() {
                guard.last_run = Some(Instant::now());
            }
            if guard.pending.is_some() {
                let now = Instant::now();
                let next = guard.last_run.map_or(now, |last| (last + interval).max(now));
                guard.trailing_scheduled = schedule_trailing(&window, next, interval);
            }
        }

        match run {
            Some(run) => {
                debug!("running coalesced trailing invocation");
                run.await;
            }
            None => debug!("coalesced trailing invocation declined"),
        }
    });
    true
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let window = self.window.lock();
        f.debug_struct("Throttle")
            .field("interval", &self.interval)
            .field("last_run", &window.last_run)
            .field("trailing_scheduled", &window.trailing_scheduled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(counter: &Arc<AtomicU32>, by: u32) -> Deferred {
        let counter = Arc::clone(counter);
        Box::new(move || {
            Some(Box::pin(async move {
                counter.fetch_add(by, Ordering::SeqCst);
            }) as BoxFuture<'static, ()>)
        })
    }

    fn noop() -> Deferred {
        Box::new(|| Some(Box::pin(async {}) as BoxFuture<'static, ()>))
    }

    fn declined() -> Deferred {
        Box::new(|| None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_runs() {
        let throttle = Throttle::new(Duration::from_millis(100));
        assert_eq!(throttle.admit(noop()), Admission::Run);
        assert!(throttle.last_run().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_inside_window_are_deferred() {
        let throttle = Throttle::new(Duration::from_millis(100));
        assert_eq!(throttle.admit(noop()), Admission::Run);
        assert_eq!(throttle.admit(noop()), Admission::Deferred);
        assert_eq!(throttle.admit(noop()), Admission::Deferred);
        assert!(throttle.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_calls_coalesce_into_latest() {
        let throttle = Throttle::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicU32::new(0));

        assert_eq!(throttle.admit(noop()), Admission::Run);
        throttle.admit(counting(&runs, 1));
        throttle.admit(counting(&runs, 10));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 10);
        assert!(!throttle.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_run_opens_new_window() {
        let throttle = Throttle::new(Duration::from_millis(100));
        assert_eq!(throttle.admit(noop()), Admission::Run);
        throttle.admit(noop());

        // trailing run at t=100 stamps the window
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(throttle.admit(noop()), Admission::Deferred);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(throttle.admit(noop()), Admission::Run);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_after_interval_runs() {
        let throttle = Throttle::new(Duration::from_millis(100));
        assert_eq!(throttle.admit(noop()), Admission::Run);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(throttle.admit(noop()), Admission::Run);
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_trailing_run_leaves_window_unstamped() {
        let throttle = Throttle::new(Duration::from_millis(100));
        assert_eq!(throttle.admit(noop()), Admission::Run);
        let stamped = throttle.last_run();
        throttle.admit(declined());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!throttle.has_pending());
        assert_eq!(throttle.last_run(), stamped);
        assert_eq!(throttle.admit(noop()), Admission::Run);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_window() {
        let throttle = Throttle::new(Duration::from_millis(100));
        assert_eq!(throttle.admit(noop()), Admission::Run);
        let start = Instant::now();

        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        assert_eq!(throttle.last_run(), Some(start + Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_runs_after_pending_trailing_work() {
        let throttle = Throttle::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicU32::new(0));
        assert_eq!(throttle.admit(noop()), Admission::Run);
        throttle.admit(counting(&runs, 1));
        let start = Instant::now();

        throttle.acquire().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }
}
