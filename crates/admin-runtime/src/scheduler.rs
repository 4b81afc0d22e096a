//! Cancellable delayed tasks and stale-response detection.
//!
//! Everything here runs on tokio's clock, so tests drive it with `tokio::time::pause()` and
//! `advance()` instead of real sleeps.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Spawns delayed tasks on the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Run `task` after `delay`. Dropping or cancelling the handle before then prevents it.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> ScheduledTask
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = tokio::time::Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            task.await;
        });
        ScheduledTask {
            handle: Some(handle),
        }
    }
}

/// Handle to a pending task. Aborts the task when dropped.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    pub fn cancel(mut self) {
        self.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Keep the task running after the handle goes away.
    pub fn detach(mut self) {
        self.handle.take();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Keeps only the most recently scheduled task; scheduling again cancels the previous one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    scheduler: Scheduler,
    delay: Duration,
    pending: Arc<Mutex<Option<ScheduledTask>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            scheduler: Scheduler::new(),
            delay,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn call<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let next = self.scheduler.schedule(self.delay, task);
        let previous = self.slot().replace(next);
        if previous.is_some() {
            trace!("Debounced pending task");
        }
    }

    pub fn cancel(&self) {
        self.slot().take();
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ScheduledTask>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Tag for one initiated load of a logical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// Hands out increasing generations. Only the newest one is current, so a late response from an
/// older request can be recognised and discarded.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    latest: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest.load(Ordering::SeqCst) == generation.0
    }

    /// Make every outstanding generation stale.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}
