//! Request id binding.

use super::derive::with_values;
use super::key::{downcast, Bindings, Key};
use super::node::Context;
use std::sync::LazyLock;
use uuid::Uuid;

static REQUEST_ID_KEY: LazyLock<Key> = LazyLock::new(|| Key::symbol("requestId"));

/// The key under which request ids are bound.
#[must_use]
pub fn request_id_key() -> &'static Key {
    &REQUEST_ID_KEY
}

/// Derives a context carrying `id` as its request id.
#[must_use]
pub fn with_request_id(parent: &Context, id: impl Into<String>) -> Context {
    with_values(parent, Bindings::new().with(request_id_key().clone(), id.into()))
}

/// Derives a context carrying a freshly generated request id.
#[must_use]
pub fn with_new_request_id(parent: &Context) -> Context {
    with_values(
        parent,
        Bindings::new().with(request_id_key().clone(), Uuid::new_v4()),
    )
}

/// Returns the nearest request id rendered as a string.
///
/// Strings, string slices, UUIDs and integers are rendered directly; any
/// other bound type falls back to its `Debug` form.
#[must_use]
pub fn request_id(ctx: &Context) -> Option<String> {
    let value = &**ctx.get(request_id_key())?;

    if let Some(id) = downcast::<String>(value) {
        return Some(id.clone());
    }
    if let Some(id) = downcast::<&'static str>(value) {
        return Some((*id).to_string());
    }
    if let Some(id) = downcast::<Uuid>(value) {
        return Some(id.to_string());
    }
    if let Some(id) = downcast::<u64>(value) {
        return Some(id.to_string());
    }
    if let Some(id) = downcast::<i64>(value) {
        return Some(id.to_string());
    }
    Some(format!("{value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{background, with_abort};

    #[test]
    fn test_request_id_absent_on_root() {
        assert_eq!(request_id(&background()), None);
    }

    #[test]
    fn test_request_id_inherited() {
        let ctx = with_request_id(&background(), "req-123");
        let child = with_abort(&ctx);
        assert_eq!(request_id(&child.ctx), Some("req-123".to_string()));
    }

    #[test]
    fn test_request_id_shadowed() {
        let outer = with_request_id(&background(), "outer");
        let inner = with_request_id(&outer, "inner");
        assert_eq!(request_id(&outer).as_deref(), Some("outer"));
        assert_eq!(request_id(&inner).as_deref(), Some("inner"));
    }

    #[test]
    fn test_new_request_id_is_uuid() {
        let ctx = with_new_request_id(&background());
        let id = request_id(&ctx).unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_request_id_renders_other_types() {
        let numeric = with_values(&background(), Bindings::new().with(request_id_key().clone(), 42_u64));
        assert_eq!(request_id(&numeric).as_deref(), Some("42"));

        let other = with_values(&background(), Bindings::new().with(request_id_key().clone(), 1.5_f32));
        assert_eq!(request_id(&other).as_deref(), Some("1.5"));
    }
}
