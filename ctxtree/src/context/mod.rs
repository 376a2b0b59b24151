//! Context trees.
//!
//! This module provides:
//! - The two root contexts, `background` and `todo`
//! - Derivations that add values, abort signals or deadlines
//! - Nearest-definer-wins lookup of values, signals and deadlines
//! - Diagnostic rendering

mod derive;
mod inspect;
mod key;
mod node;
mod request_id;


pub use derive::{
    with_abort, with_deadline, with_deadline_using, with_timeout, with_timeout_using, with_values,
    Abortable,
};
pub use inspect::{BindingView, ContextView};
pub use key::{Bindings, ContextValue, Key, Symbol, Value};
pub use node::{background, lookup, todo, Ancestors, Context};
pub use request_id::{request_id, request_id_key, with_new_request_id, with_request_id};
