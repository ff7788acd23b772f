//! Macro contexts and the inline macro-definition syntax
//!
//! A macro is a named string substitution value. Macros come from two
//! places: repeatable `-D KEY=VAL` command-line definitions (global, lowest
//! precedence) and the compact `path:NAME=VALUE,...` syntax attached to a
//! file specifier (per file, wins on collision).

mod scanner;
mod specifier;

pub use scanner::parse_macros;
pub use specifier::FileSpecifier;

use indexmap::IndexMap;

/// An ordered mapping of macro name to value.
///
/// Keys are unique; a later assignment to the same name replaces the value.
/// Insertion order is preserved for debugging output only and never affects
/// lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroContext {
    values: IndexMap<String, String>,
}

impl MacroContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `overrides` on top of this context, returning the combined
    /// context. Bindings in `overrides` win on name collision.
    pub fn merged(&self, overrides: &MacroContext) -> MacroContext {
        let mut out = self.clone();
        for (name, value) in overrides.iter() {
            out.insert(name, value);
        }
        out
    }

    /// Build a context from raw `KEY=VAL` definition arguments.
    ///
    /// Each argument is split on the first `=`; a missing `=` binds the
    /// whole (trimmed) argument to the empty string. Arguments with an
    /// empty key are skipped.
    pub fn from_defines<S: AsRef<str>>(defines: &[S]) -> MacroContext {
        let mut ctx = MacroContext::new();
        for raw in defines {
            let raw = raw.as_ref();
            let (key, value) = match raw.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (raw.trim(), ""),
            };
            if !key.is_empty() {
                ctx.insert(key, value);
            }
        }
        ctx
    }
}
