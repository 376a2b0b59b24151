//! Timer backed by tokio tasks.

use super::driver::{driver, DriverKey};
use super::{Timer, TimerCallback, TimerHandle};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Where a pending callback is waiting.
#[derive(Debug)]
enum Registration {
    Task(tokio::task::AbortHandle),
    Driver(DriverKey),
}

/// A [`Timer`] that sleeps on the current tokio runtime.
///
/// When no runtime is current at scheduling time, the callback is queued on
/// a single shared driver thread instead, so deadlines still fire from
/// synchronous code. Cancelling releases the callback on either path.
#[derive(Debug, Default)]
pub struct TokioTimer {
    next_id: AtomicU64,
    /// Pending callbacks. Whoever removes an entry owns the outcome: the
    /// sleeper runs the callback, `cancel` suppresses it. The registration
    /// is filled in once scheduling returns.
    pending: Arc<DashMap<u64, Option<Registration>>>,
}

impl TokioTimer {
    /// Creates a new timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of callbacks that have neither run nor been
    /// cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending.clone();
        self.pending.insert(id, None);

        let registration = if let Ok(runtime) = Handle::try_current() {
            let task = runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if pending.remove(&id).is_some() {
                    callback();
                }
            });
            Registration::Task(task.abort_handle())
        } else {
            let key = driver().schedule(
                delay,
                Box::new(move || {
                    if pending.remove(&id).is_some() {
                        callback();
                    }
                }),
            );
            Registration::Driver(key)
        };

        if let Some(mut entry) = self.pending.get_mut(&id) {
            *entry = Some(registration);
        }
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: &TimerHandle) {
        let Some((_, registration)) = self.pending.remove(&handle.id()) else {
            return;
        };
        match registration {
            Some(Registration::Task(task)) => task.abort(),
            Some(Registration::Driver(key)) => {
                driver().cancel(key);
            }
            None => {}
        }
    }
}
