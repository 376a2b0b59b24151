//! Observability utilities.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. [`init_tracing`] is a convenience for binaries and
//! tests that want one.

mod spans;
mod subscriber;

pub use spans::context_span;
pub use subscriber::{init_tracing, LogFormat, TracingConfig, LOG_FORMAT_ENV};
