//! Binding keys and values.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(0);

/// A unique opaque token.
///
/// Two symbols are equal only if one was cloned from the other; the
/// description is for display and never takes part in comparison.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    /// Creates a new symbol distinct from every other symbol.
    #[must_use]
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    /// Returns the description given at creation.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// A key under which a context binds a value.
///
/// String keys compare by content; symbol keys by identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A string key.
    Name(Arc<str>),
    /// A symbol key.
    Symbol(Symbol),
}

impl Key {
    /// Creates a string key.
    #[must_use]
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Self::Name(name.into())
    }

    /// Creates a key backed by a fresh [`Symbol`].
    #[must_use]
    pub fn symbol(description: impl Into<Arc<str>>) -> Self {
        Self::Symbol(Symbol::new(description))
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::name(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::name(name)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name:?}"),
            Self::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}

/// A value that can be bound in a context.
///
/// Implemented for every `'static` type that is `Send + Sync + Debug`.
pub trait ContextValue: Any + Send + Sync + fmt::Debug {
    /// Returns the value as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the name of the concrete type.
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + fmt::Debug> ContextValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A shared, type-erased bound value.
pub type Value = Arc<dyn ContextValue>;

/// Downcasts a bound value to a concrete type.
pub(crate) fn downcast<T: Any>(value: &dyn ContextValue) -> Option<&T> {
    value.as_any().downcast_ref::<T>()
}

/// An ordered set of key/value pairs to bind on a derived context.
///
/// Binding the same key twice keeps the later value.
#[derive(Clone, Default)]
pub struct Bindings {
    entries: Vec<(Key, Value)>,
}

impl Bindings {
    /// Creates an empty set of bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding.
    #[must_use]
    pub fn with<V: ContextValue>(self, key: impl Into<Key>, value: V) -> Self {
        self.with_value(key, Arc::new(value))
    }

    /// Adds an already shared value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<Key>, value: Value) -> Self {
        self.insert(key.into(), value);
        self
    }

    /// Inserts a binding, replacing an earlier one for the same key.
    pub fn insert(&mut self, key: Key, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Gets the value bound to `key`.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl<K: Into<Key>> FromIterator<(K, Value)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut bindings = Self::new();
        for (key, value) in iter {
            bindings.insert(key.into(), value);
        }
        bindings
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
