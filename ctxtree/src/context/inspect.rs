//! Diagnostic rendering of contexts.
//!
//! Nothing here affects behavior. A context renders as `Context< background >`
//! or `Context< TODO >` for the roots, and otherwise as the flattened set of
//! everything it can see, nearest definition winning.

use super::key::Key;
use super::node::{Context, Origin};
use crate::utils::format_iso8601;
use serde::Serialize;
use std::fmt;

/// A single flattened binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingView {
    /// The key, rendered with `Display`.
    pub key: String,
    /// The value, rendered with `Debug`.
    pub value: String,
}

/// A serializable snapshot of what a context exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextView {
    /// `"background"` or `"TODO"`: the root this context descends from.
    pub root: &'static str,
    /// Number of derivations between the context and its root.
    pub depth: usize,
    /// Fired state of the nearest signal, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
    /// Nearest deadline in ISO 8601, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// Visible bindings, outermost first, shadowed entries replaced in place.
    pub bindings: Vec<BindingView>,
}

impl ContextView {
    /// Converts to a JSON value for structured logging.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn root_label(origin: Origin) -> &'static str {
    match origin {
        Origin::Background => "background",
        Origin::Todo => "TODO",
        // Every ancestor chain ends at a root, so this only shows up if a
        // derived node is labeled directly.
        Origin::Derived => "derived",
    }
}

/// Merges local bindings from the root down, so nearer definitions replace
/// farther ones without changing position.
fn flatten(ctx: &Context) -> Vec<(Key, String)> {
    let chain: Vec<&Context> = ctx.ancestors().collect();
    let mut merged: Vec<(Key, String)> = Vec::new();

    for node in chain.into_iter().rev() {
        for (key, value) in node.local_values().iter() {
            let rendered = format!("{value:?}");
            match merged.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = rendered,
                None => merged.push((key.clone(), rendered)),
            }
        }
    }
    merged
}

impl Context {
    /// Returns a diagnostic snapshot of this context.
    #[must_use]
    pub fn inspect(&self) -> ContextView {
        let root = self
            .ancestors()
            .last()
            .map_or(Origin::Background, Context::origin);

        ContextView {
            root: root_label(root),
            depth: self.depth(),
            cancelled: self.signal().map(|s| s.is_fired()),
            deadline: self.deadline().map(|d| format_iso8601(&d)),
            bindings: flatten(self)
                .into_iter()
                .map(|(key, value)| BindingView {
                    key: key.to_string(),
                    value,
                })
                .collect(),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin() {
            Origin::Background => return f.write_str("Context< background >"),
            Origin::Todo => return f.write_str("Context< TODO >"),
            Origin::Derived => {}
        }

        let mut entries: Vec<String> = Vec::new();
        if let Some(signal) = self.signal() {
            entries.push(format!("signal: {signal:?}"));
        }
        if let Some(deadline) = self.deadline() {
            entries.push(format!("deadline: {}", format_iso8601(&deadline)));
        }
        for (key, value) in flatten(self) {
            entries.push(format!("{key:?}: {value}"));
        }

        if entries.is_empty() {
            f.write_str("Context< {} >")
        } else {
            write!(f, "Context< {{ {} }} >", entries.join(", "))
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
