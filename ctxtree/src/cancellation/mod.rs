//! Cancellation signals and the links that propagate them.
//!
//! This module provides:
//! - `AbortSignal`, a fire-once signal with removable listeners
//! - `AbortHandle`, the caller's side of a derived context's signal

mod deferred;
mod link;
mod signal;

pub(crate) use link::AbortLink;
pub use link::AbortHandle;
pub use signal::{AbortSignal, FireCallback, Subscription};
