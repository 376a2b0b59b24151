//! # ctxtree
//!
//! Cancellation and value propagation for cooperative concurrent work.
//!
//! A [`Context`](context::Context) carries:
//!
//! - **A cancellation signal**: cancelling a context cancels everything
//!   derived from it, never its ancestors or siblings
//! - **An optional deadline**: a child can tighten its parent's deadline but
//!   never relax it
//! - **Key/value bindings**: a child sees its ancestors' bindings unless it
//!   shadows them
//!
//! Contexts are immutable. Every derivation returns a new node pointing at
//! its parent, rooted at [`background`](context::background) or
//! [`todo`](context::todo).
//!
//! ## Quick Start
//!
//! ```rust
//! use ctxtree::prelude::*;
//!
//! let request = with_request_id(&background(), "req-42");
//! let job = with_abort(&request);
//! let step = with_values(&job.ctx, Bindings::new().with("step", 1_u32));
//!
//! job.abort();
//!
//! assert!(step.is_cancelled());
//! assert_eq!(request_id(&step).as_deref(), Some("req-42"));
//! assert!(!request.is_cancelled());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod errors;
pub mod observability;
pub mod testing;
pub mod time;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{AbortHandle, AbortSignal, Subscription};
    pub use crate::context::{
        background, lookup, request_id, todo, with_abort, with_deadline, with_deadline_using,
        with_new_request_id, with_request_id, with_timeout, with_timeout_using, with_values,
        Abortable, Bindings, Context, Key,
    };
    pub use crate::errors::{ContextError, Result};
    pub use crate::time::{Clock, TimeSource, Timer};
    pub use crate::utils::{Deadline, Timestamp};
}
