//! Clock and timer capabilities used by deadline derivations.
//!
//! The context core never reads the wall clock or spawns timers directly;
//! it goes through a [`TimeSource`]. Production code uses the process-wide
//! source (system clock plus [`TokioTimer`]); tests inject a manual one.

mod driver;
mod tokio_timer;

pub use tokio_timer::TokioTimer;

use crate::utils::{now_utc, Timestamp};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// A callback scheduled on a [`Timer`].
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Timestamp;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now_utc()
    }
}

/// Opaque handle to a scheduled timer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Creates a handle from a timer-assigned id.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the timer-assigned id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// One-shot timer capability.
pub trait Timer: Send + Sync {
    /// Schedules `callback` to run once after `delay`.
    ///
    /// A zero delay means "as soon as possible".
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancels a pending callback.
    ///
    /// A no-op if the callback already ran or was already cancelled.
    fn cancel(&self, handle: &TimerHandle);
}

/// A clock paired with a timer.
#[derive(Clone)]
pub struct TimeSource {
    clock: Arc<dyn Clock>,
    timer: Arc<dyn Timer>,
}

impl TimeSource {
    /// Creates a time source from a clock and a timer.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, timer: Arc<dyn Timer>) -> Self {
        Self { clock, timer }
    }

    /// The system clock with a [`TokioTimer`].
    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(TokioTimer::new()))
    }

    /// Returns the current instant according to this source's clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the timer.
    #[must_use]
    pub fn timer(&self) -> &Arc<dyn Timer> {
        &self.timer
    }
}

impl std::fmt::Debug for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSource")
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}

static GLOBAL_TIME_SOURCE: RwLock<Option<TimeSource>> = RwLock::new(None);

/// Sets the process-wide time source used by `with_deadline` and
/// `with_timeout`.
pub fn set_time_source(source: TimeSource) {
    *GLOBAL_TIME_SOURCE.write() = Some(source);
}

/// Clears the process-wide time source, restoring the system default.
pub fn clear_time_source() {
    *GLOBAL_TIME_SOURCE.write() = None;
}

/// Gets the process-wide time source.
///
/// Returns [`TimeSource::system`] if none is set.
pub fn time_source() -> TimeSource {
    GLOBAL_TIME_SOURCE
        .read()
        .clone()
        .unwrap_or_else(TimeSource::system)
}
