//! Shared timer thread for callers outside a tokio runtime.

use super::TimerCallback;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static DRIVER: LazyLock<ThreadDriver> = LazyLock::new(ThreadDriver::default);

/// Returns the process-wide driver.
pub(super) fn driver() -> &'static ThreadDriver {
    &DRIVER
}

/// Position of a callback in the driver's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) struct DriverKey {
    due: Instant,
    seq: u64,
}

#[derive(Default)]
struct Queue {
    next_seq: u64,
    entries: BTreeMap<DriverKey, TimerCallback>,
    /// True while a driver thread is alive to serve `entries`.
    running: bool,
}

/// A single background thread sleeping until the earliest due callback.
///
/// The thread starts on first use and exits once the queue drains, so an
/// idle process holds no timer thread. Cancelling removes the callback from
/// the queue and drops it right away.
#[derive(Default)]
pub(super) struct ThreadDriver {
    queue: Mutex<Queue>,
    wake: Condvar,
}

impl ThreadDriver {
    /// Queues `callback` to run after `delay`.
    pub(super) fn schedule(&'static self, delay: Duration, callback: TimerCallback) -> DriverKey {
        let now = Instant::now();
        let due = now.checked_add(delay).unwrap_or_else(|| far_future(now));

        let mut queue = self.queue.lock();
        let key = DriverKey {
            due,
            seq: queue.next_seq,
        };
        queue.next_seq += 1;
        queue.entries.insert(key, callback);

        if queue.running {
            self.wake.notify_one();
        } else {
            self.start(&mut queue);
        }
        key
    }

    /// Removes a queued callback. Returns true if it had not run yet.
    pub(super) fn cancel(&self, key: DriverKey) -> bool {
        let removed = {
            let mut queue = self.queue.lock();
            let removed = queue.entries.remove(&key);
            if removed.is_some() {
                self.wake.notify_one();
            }
            removed
        };
        // Dropped outside the lock: the callback may own the last reference
        // to state whose teardown takes other locks.
        removed.is_some()
    }

    /// Returns whether a driver thread is currently alive.
    #[cfg(test)]
    pub(super) fn is_running(&self) -> bool {
        self.queue.lock().running
    }

    fn start(&'static self, queue: &mut MutexGuard<'_, Queue>) {
        let spawned = std::thread::Builder::new()
            .name("ctxtree-timer".to_string())
            .spawn(move || self.run());
        match spawned {
            Ok(_) => {
                queue.running = true;
                debug!("started timer driver thread");
            }
            // Left queued; the next `schedule` retries the spawn.
            Err(e) => warn!(error = %e, "failed to start timer driver thread"),
        }
    }

    fn run(&self) {
        let mut queue = self.queue.lock();
        loop {
            let Some(&key) = queue.entries.keys().next() else {
                queue.running = false;
                debug!("timer driver thread idle, exiting");
                return;
            };

            if key.due > Instant::now() {
                self.wake.wait_until(&mut queue, key.due);
                continue;
            }

            if let Some(callback) = queue.entries.remove(&key) {
                MutexGuard::unlocked(&mut queue, || run_callback(callback));
            }
        }
    }
}

/// A stand-in for delays too large to represent as an `Instant`.
fn far_future(now: Instant) -> Instant {
    const CENTURY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);
    now.checked_add(CENTURY).unwrap_or(now)
}

fn run_callback(callback: TimerCallback) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Timer callback panicked: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        for _ in 0..400 {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_callback_runs_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        driver().schedule(
            Duration::from_millis(10),
            Box::new(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(wait_for(|| counter.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_cancel_drops_callback_immediately() {
        let owned = Arc::new(());
        let held = owned.clone();

        let key = driver().schedule(Duration::from_secs(3600), Box::new(move || drop(held)));
        assert_eq!(Arc::strong_count(&owned), 2);

        assert!(driver().cancel(key));
        assert_eq!(Arc::strong_count(&owned), 1);
        assert!(!driver().cancel(key));
    }

    #[test]
    fn test_callbacks_run_in_due_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        for (delay, label) in [(30_u64, 3_u32), (10, 1), (20, 2)] {
            let order = order.clone();
            driver().schedule(
                Duration::from_millis(delay),
                Box::new(move || order.lock().push(label)),
            );
        }

        assert!(wait_for(|| order.lock().len() == 3));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_driver() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        driver().schedule(Duration::ZERO, Box::new(|| panic!("timer callback failure")));
        driver().schedule(
            Duration::from_millis(5),
            Box::new(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(wait_for(|| counter.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_huge_delay_does_not_overflow() {
        let key = driver().schedule(Duration::MAX, Box::new(|| {}));
        assert!(driver().cancel(key));
    }
}
