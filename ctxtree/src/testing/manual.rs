//! Deterministic clock and timer.

use crate::time::{Clock, TimeSource, Timer, TimerCallback, TimerHandle};
use crate::utils::{from_unix_millis, saturating_add, Timestamp};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default starting instant for a [`ManualClock`]: 2023-11-14T22:13:20Z.
const DEFAULT_EPOCH_MILLIS: i64 = 1_700_000_000_000;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a clock reading the given instant.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = saturating_add(*now, by);
    }

    /// Sets the clock to an arbitrary instant.
    pub fn set(&self, instant: Timestamp) {
        *self.now.lock() = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(from_unix_millis(DEFAULT_EPOCH_MILLIS))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// A timer whose callbacks fire only when [`advance`](Self::advance) or
/// [`run_due`](Self::run_due) is called.
pub struct ManualTimer {
    clock: Arc<ManualClock>,
    /// Keyed by (due instant, id) so equal deadlines fire in schedule order.
    pending: Mutex<BTreeMap<(Timestamp, u64), TimerCallback>>,
    next_id: Mutex<u64>,
}

impl ManualTimer {
    /// Creates a timer driven by `clock`.
    #[must_use]
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            pending: Mutex::new(BTreeMap::new()),
            next_id: Mutex::new(0),
        }
    }

    /// Advances the clock and runs every callback that became due, in due
    /// order. Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        self.clock.advance(by);
        self.run_due()
    }

    /// Runs every callback due at the current clock reading.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.clock.now();
            let next = {
                let mut pending = self.pending.lock();
                match pending.keys().next().copied() {
                    Some(key) if key.0 <= now => pending.remove(&key),
                    _ => None,
                }
            };
            let Some(callback) = next else {
                return ran;
            };
            callback();
            ran += 1;
        }
    }

    /// Returns the number of callbacks not yet run or cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = {
            let mut next_id = self.next_id.lock();
            let id = *next_id;
            *next_id += 1;
            id
        };
        let due = saturating_add(self.clock.now(), delay);
        self.pending.lock().insert((due, id), callback);
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: &TimerHandle) {
        self.pending.lock().retain(|(_, id), _| *id != handle.id());
    }
}

impl std::fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTimer")
            .field("now", &self.clock.now())
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

/// Builds a [`TimeSource`] from a fresh [`ManualClock`] and [`ManualTimer`].
#[must_use]
pub fn manual_time_source() -> (TimeSource, Arc<ManualClock>, Arc<ManualTimer>) {
    let clock = Arc::new(ManualClock::default());
    let timer = Arc::new(ManualTimer::new(clock.clone()));
    let source = TimeSource::new(clock.clone(), timer.clone());
    (source, clock, timer)
}
