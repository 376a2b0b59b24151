//! The immutable context node.

use super::key::{downcast, Bindings, ContextValue, Key, Value};
use crate::cancellation::AbortSignal;
use crate::errors::{ContextError, Result};
use crate::utils::Timestamp;
use std::any::Any;
use std::sync::{Arc, LazyLock};

static BACKGROUND: LazyLock<Context> = LazyLock::new(|| Context::root(Origin::Background));
static TODO: LazyLock<Context> = LazyLock::new(|| Context::root(Origin::Todo));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Background,
    Todo,
    Derived,
}

struct Node {
    origin: Origin,
    parent: Option<Context>,
    signal: Option<AbortSignal>,
    deadline: Option<Timestamp>,
    values: Bindings,
}

impl Drop for Node {
    // Unlinks the ancestor chain one node at a time, so dropping the last
    // handle to a deep chain does not recurse once per level.
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(Context(node)) = next {
            next = Arc::into_inner(node).and_then(|mut node| node.parent.take());
        }
    }
}

/// A node in a tree of contexts.
///
/// A context carries an optional cancellation signal, an optional deadline
/// and a set of key/value bindings. Everything not defined locally is read
/// from the nearest ancestor that defines it. Contexts never change after
/// creation; deriving always builds a new node.
///
/// Cloning is cheap and yields the same node: equality is identity, never
/// content.
#[derive(Clone)]
pub struct Context(Arc<Node>);

impl Context {
    fn root(origin: Origin) -> Self {
        Self(Arc::new(Node {
            origin,
            parent: None,
            signal: None,
            deadline: None,
            values: Bindings::new(),
        }))
    }

    /// The root for real top-level work.
    #[must_use]
    pub fn background() -> Self {
        BACKGROUND.clone()
    }

    /// The root for call sites that do not yet receive a proper context.
    #[must_use]
    pub fn todo() -> Self {
        TODO.clone()
    }

    pub(crate) fn derive(
        parent: &Self,
        signal: Option<AbortSignal>,
        deadline: Option<Timestamp>,
        values: Bindings,
    ) -> Self {
        Self(Arc::new(Node {
            origin: Origin::Derived,
            parent: Some(parent.clone()),
            signal,
            deadline,
            values,
        }))
    }

    pub(crate) fn origin(&self) -> Origin {
        self.0.origin
    }

    /// Returns the context this one was derived from.
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.0.parent.as_ref()
    }

    /// Returns true for the `background` and `todo` roots.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    /// Returns true if this is the `background` root.
    #[must_use]
    pub fn is_background(&self) -> bool {
        self.0.origin == Origin::Background
    }

    /// Returns true if this is the `todo` root.
    #[must_use]
    pub fn is_todo(&self) -> bool {
        self.0.origin == Origin::Todo
    }

    /// Iterates from this context up to its root, inclusive.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Returns the number of derivations between this context and its root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// Looks up the value bound to `key` by the nearest context, starting
    /// with this one.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.ancestors().find_map(|ctx| ctx.0.values.get(key))
    }

    /// Returns true if this context or an ancestor binds `key`.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Looks up `key` and downcasts the nearest binding to `T`.
    ///
    /// Returns `None` both when the key is unbound and when the nearest
    /// binding has another type; use [`try_value`](Self::try_value) to tell
    /// the two apart.
    #[must_use]
    pub fn value<T: Any>(&self, key: &Key) -> Option<&T> {
        self.get(key).and_then(|value| downcast::<T>(&**value))
    }

    /// Looks up `key` and downcasts the nearest binding to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if the nearest binding exists
    /// but holds another type.
    pub fn try_value<T: Any>(&self, key: &Key) -> Result<Option<&T>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        downcast::<T>(&**value).map(Some).ok_or_else(|| {
            ContextError::type_mismatch(std::any::type_name::<T>(), (**value).type_name())
        })
    }

    /// Looks up a context stored as a bound value.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if the nearest binding for
    /// `key` is not a context.
    pub fn value_context(&self, key: &Key) -> Result<Option<Self>> {
        self.try_value::<Self>(key).map(|ctx| ctx.cloned())
    }

    /// Recovers a context from a type-erased value.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if `value` is not a context.
    pub fn try_from_any(value: &dyn Any) -> Result<Self> {
        value
            .downcast_ref::<Self>()
            .cloned()
            .ok_or_else(|| ContextError::type_mismatch("Context", "a non-context value"))
    }

    /// Returns the nearest cancellation signal.
    #[must_use]
    pub fn signal(&self) -> Option<&AbortSignal> {
        self.ancestors().find_map(|ctx| ctx.0.signal.as_ref())
    }

    /// Returns the nearest deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Timestamp> {
        self.ancestors().find_map(|ctx| ctx.0.deadline)
    }

    /// Returns true if the nearest signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal().is_some_and(AbortSignal::is_fired)
    }

    /// Waits until the nearest signal fires.
    ///
    /// Never resolves for a context without a signal.
    pub async fn cancelled(&self) {
        match self.signal() {
            Some(signal) => signal.cancelled().await,
            None => std::future::pending().await,
        }
    }

    pub(crate) fn local_signal(&self) -> Option<&AbortSignal> {
        self.0.signal.as_ref()
    }

    pub(crate) fn local_deadline(&self) -> Option<Timestamp> {
        self.0.deadline
    }

    pub(crate) fn local_values(&self) -> &Bindings {
        &self.0.values
    }

    /// Returns true if both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Context {}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

/// Iterator over a context and its ancestors.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    next: Option<&'a Context>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Context;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Returns the `background` root context.
#[must_use]
pub fn background() -> Context {
    Context::background()
}

/// Returns the `todo` root context.
#[must_use]
pub fn todo() -> Context {
    Context::todo()
}

/// Looks up the value bound to `key` by `ctx` or its nearest ancestor.
#[must_use]
pub fn lookup<'a>(ctx: &'a Context, key: &Key) -> Option<&'a Value> {
    ctx.get(key)
}
