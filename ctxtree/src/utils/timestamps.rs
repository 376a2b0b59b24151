//! Timestamp helpers for deadline arithmetic.

use chrono::{DateTime, TimeZone, Utc};
use std::time::{Duration, SystemTime};

/// An absolute instant, always in UTC.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Converts a Unix timestamp in milliseconds to a [`Timestamp`].
///
/// Values outside chrono's representable range saturate to the nearest
/// bound.
#[must_use]
pub fn from_unix_millis(millis: i64) -> Timestamp {
    Utc.timestamp_millis_opt(millis).single().unwrap_or(if millis < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Returns the time remaining from `now` until `deadline`.
///
/// A deadline in the past yields a zero delay.
#[must_use]
pub fn delay_until(now: Timestamp, deadline: Timestamp) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

/// Adds a duration to a timestamp, saturating at the maximum instant.
#[must_use]
pub fn saturating_add(base: Timestamp, duration: Duration) -> Timestamp {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| base.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Formats a timestamp as ISO 8601 string.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// An absolute deadline accepted by deadline-based derivations.
///
/// Converts from a [`Timestamp`], a [`SystemTime`], or a Unix timestamp in
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Timestamp);

impl Deadline {
    /// Creates a deadline at the given instant.
    #[must_use]
    pub fn at(instant: Timestamp) -> Self {
        Self(instant)
    }

    /// Creates a deadline from a Unix timestamp in milliseconds.
    #[must_use]
    pub fn from_unix_millis(millis: i64) -> Self {
        Self(from_unix_millis(millis))
    }

    /// Returns the deadline as an absolute instant.
    #[must_use]
    pub fn instant(&self) -> Timestamp {
        self.0
    }

    /// Returns the deadline as a Unix timestamp in milliseconds.
    #[must_use]
    pub fn unix_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl From<Timestamp> for Deadline {
    fn from(instant: Timestamp) -> Self {
        Self(instant)
    }
}

impl From<i64> for Deadline {
    fn from(millis: i64) -> Self {
        Self::from_unix_millis(millis)
    }
}

impl From<SystemTime> for Deadline {
    fn from(time: SystemTime) -> Self {
        Self(DateTime::<Utc>::from(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_from_unix_millis() {
        let dt = from_unix_millis(1_696_512_000_123);
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn test_from_unix_millis_saturates() {
        assert_eq!(from_unix_millis(i64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(from_unix_millis(i64::MIN), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_delay_until_future() {
        let now = from_unix_millis(1_000);
        let deadline = from_unix_millis(1_250);
        assert_eq!(delay_until(now, deadline), Duration::from_millis(250));
    }

    #[test]
    fn test_delay_until_past_is_zero() {
        let now = from_unix_millis(5_000);
        let deadline = from_unix_millis(1_000);
        assert_eq!(delay_until(now, deadline), Duration::ZERO);
    }

    #[test]
    fn test_saturating_add() {
        let base = from_unix_millis(0);
        assert_eq!(
            saturating_add(base, Duration::from_millis(100)),
            from_unix_millis(100)
        );
        assert_eq!(
            saturating_add(DateTime::<Utc>::MAX_UTC, Duration::from_secs(1)),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn test_deadline_conversions() {
        let from_millis = Deadline::from(1_696_512_000_000_i64);
        let from_instant = Deadline::from(from_unix_millis(1_696_512_000_000));
        assert_eq!(from_millis, from_instant);
        assert_eq!(from_millis.unix_millis(), 1_696_512_000_000);

        let from_system = Deadline::from(SystemTime::UNIX_EPOCH + Duration::from_millis(42));
        assert_eq!(from_system.unix_millis(), 42);
    }

    #[test]
    fn test_format_iso8601() {
        let ts = format_iso8601(&from_unix_millis(0));
        assert_eq!(ts, "1970-01-01T00:00:00.000000+00:00");
    }
}
