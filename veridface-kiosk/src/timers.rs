// Cancellable scheduled tasks owned by whichever component started them.
//
// All delays and periodic work in the kiosk go through `ScheduledTask`, so
// tearing a component down (dropping it) is enough to guarantee none of its
// callbacks run afterwards.

use log::debug;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shared flag checked by a task before it touches any state.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a spawned timer task. Dropping the handle cancels the task.
///
/// Must be created from within a tokio runtime.
#[derive(Debug)]
pub struct ScheduledTask {
    label: &'static str,
    flag: CancelFlag,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Runs `callback` once after `delay`.
    pub fn after<F, Fut>(label: &'static str, delay: Duration, callback: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let flag = CancelFlag::new();
        let guard = flag.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if guard.is_cancelled() {
                return;
            }
            callback().await;
        });
        ScheduledTask { label, flag, handle: Some(handle) }
    }

    /// Runs `callback` every `period`, first firing one period from now.
    /// A slow callback delays the next tick instead of bunching them up.
    pub fn every<F, Fut>(label: &'static str, period: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let flag = CancelFlag::new();
        let guard = flag.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if guard.is_cancelled() {
                    break;
                }
                callback().await;
            }
        });
        ScheduledTask { label, flag, handle: Some(handle) }
    }

    /// Spawns an arbitrary future bound to a caller-supplied flag. The future
    /// is expected to check the flag at its own suspension points.
    pub fn spawn<Fut>(label: &'static str, flag: CancelFlag, task: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        ScheduledTask { label, flag, handle: Some(handle) }
    }

    pub fn cancel(&mut self) {
        self.flag.cancel();
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                debug!("[Timers] Cancelling pending task '{}'", self.label);
            }
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.flag.is_cancelled()
            && self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.flag.clone()
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
