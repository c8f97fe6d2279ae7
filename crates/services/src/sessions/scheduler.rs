//! Repeating tick sources for the session countdown.
//!
//! A scheduled callback should only post an event to the session owner; the
//! owner applies it with `SessionController::tick`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};

pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

pub trait TickScheduler: Send + Sync {
    /// Invoke `on_tick` every `interval` until the returned handle is cancelled or dropped.
    fn schedule(&self, interval: Duration, on_tick: TickCallback) -> TickHandle;
}

/// Cancellation handle for a scheduled callback. Dropping it cancels too.
#[must_use = "dropping the handle cancels the callback"]
pub struct TickHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickHandle {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHandle")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

//
// ─── TOKIO ─────────────────────────────────────────────────────────────────────
//

/// Runs callbacks on a tokio task driven by `tokio::time::interval_at`.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule(&self, interval: Duration, mut on_tick: TickCallback) -> TickHandle {
        let task = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                on_tick();
            }
        });
        TickHandle::new(move || task.abort())
    }
}

//
// ─── MANUAL ────────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct ManualSlots {
    next_id: u64,
    callbacks: Vec<(u64, TickCallback)>,
}

/// Deterministic scheduler: callbacks run only when `fire` is called.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    slots: Arc<Mutex<ManualSlots>>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every live callback `times` times.
    pub fn fire(&self, times: usize) {
        for _ in 0..times {
            let mut slots = self.lock();
            for (_, callback) in &mut slots.callbacks {
                callback();
            }
        }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().callbacks.len()
    }

    fn lock(&self) -> MutexGuard<'_, ManualSlots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&self, _interval: Duration, on_tick: TickCallback) -> TickHandle {
        let id = {
            let mut slots = self.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.callbacks.push((id, on_tick));
            id
        };
        let slots = Arc::clone(&self.slots);
        TickHandle::new(move || {
            let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.callbacks.retain(|(slot, _)| *slot != id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TickCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let callback: TickCallback = Box::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn manual_fire_runs_live_callbacks_only() {
        let scheduler = ManualScheduler::new();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();
        let first_handle = scheduler.schedule(Duration::from_secs(1), first_cb);
        let second_handle = scheduler.schedule(Duration::from_secs(1), second_cb);

        scheduler.fire(3);
        first_handle.cancel();
        scheduler.fire(2);

        assert_eq!(first.load(Ordering::SeqCst), 3);
        assert_eq!(second.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.live_count(), 1);

        drop(second_handle);
        scheduler.fire(1);
        assert_eq!(second.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_ticks_after_each_interval() {
        let scheduler = TokioScheduler::new(Handle::current());
        let (count, callback) = counter();
        let handle = scheduler.schedule(Duration::from_secs(1), callback);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
