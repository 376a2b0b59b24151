//! Error types for context derivation and lookup.
//!
//! Cancellation is a signal, not an error: a fired context never raises.
//! The only failure a caller can hit is handing a non-context where a
//! context is required, which mostly happens when contexts travel
//! type-erased through `dyn Any`.

use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, ContextError>;

/// The error type for ctxtree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A value of the wrong type was supplied where another was required.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The type that was required.
        expected: &'static str,
        /// A description of what was supplied instead.
        found: &'static str,
    },
}

impl ContextError {
    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Returns true if this is a type mismatch.
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}
