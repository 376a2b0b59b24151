//! Utility functions for timestamps and deadline arithmetic.

pub mod timestamps;

pub use timestamps::{
    delay_until, format_iso8601, from_unix_millis, now_utc, saturating_add, Deadline, Timestamp,
};
