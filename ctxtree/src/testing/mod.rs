//! Testing utilities for code that threads contexts.
//!
//! This module provides:
//! - A manually advanced clock
//! - A fake timer that fires due callbacks when the clock is advanced
//! - A helper wiring both into a [`TimeSource`](crate::time::TimeSource)

mod manual;

pub use manual::{manual_time_source, ManualClock, ManualTimer};
