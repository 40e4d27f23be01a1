//! The namespace store: the session's single shared mutable state
//!
//! One store per process. Every component (engine, introspection, commands,
//! persistence, tool bridge) observes the same instance; nothing keeps a
//! private copy. The store itself never executes code.

use std::collections::BTreeMap;

use crate::runtime::Value;

/// Names maintained by the engine itself: execution history accessors, the
/// runtime self-reference and exit/quit sentinels. Excluded from user-facing
/// listings and from snapshots.
pub const RESERVED_NAMES: &[&str] = &["In", "Out", "exit", "quit", "shell"];

/// Leading-underscore names are hidden from listings except these
/// output/input history accessors.
pub const UNDERSCORE_WHITELIST: &[&str] = &["_", "__", "___", "_i", "_ii", "_iii"];

/// The shared mapping of identifiers to live values, plus the two session
/// metadata maps that travel with it through every snapshot.
#[derive(Debug, Default)]
pub struct NamespaceStore {
    bindings: BTreeMap<String, Value>,
    session_vars: BTreeMap<String, Value>,
    session_meta: BTreeMap<String, Value>,
}

impl NamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.bindings.get_mut(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Bulk insertion, used by the tool bridge to inject helper routines.
    pub fn set_many(&mut self, bindings: impl IntoIterator<Item = (String, Value)>) {
        for (name, value) in bindings {
            self.bindings.insert(name, value);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    /// Iterate every binding, including reserved ones. Persistence applies
    /// its own exclusion on top of this.
    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }

    /// All bound names, including reserved ones (completion wants these).
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(|s| s.as_str())
    }

    pub fn is_reserved(name: &str) -> bool {
        RESERVED_NAMES.contains(&name)
    }

    /// Whether a name appears in user-facing listings.
    pub fn is_listed(name: &str) -> bool {
        if Self::is_reserved(name) {
            return false;
        }
        if name.starts_with('_') {
            return UNDERSCORE_WHITELIST.contains(&name);
        }
        true
    }

    /// User-visible names, optionally filtered by a case-insensitive
    /// substring. Sorted and duplicate-free (the backing map guarantees
    /// both).
    pub fn list_names(&self, filter: Option<&str>) -> Vec<String> {
        let needle = filter.map(|f| f.to_lowercase());
        self.bindings
            .keys()
            .filter(|name| Self::is_listed(name))
            .filter(|name| match &needle {
                Some(n) => name.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn session_vars(&self) -> &BTreeMap<String, Value> {
        &self.session_vars
    }

    pub fn session_meta(&self) -> &BTreeMap<String, Value> {
        &self.session_meta
    }

    pub fn set_session_var(&mut self, name: impl Into<String>, value: Value) {
        self.session_vars.insert(name.into(), value);
    }

    pub fn set_session_meta(&mut self, name: impl Into<String>, value: Value) {
        self.session_meta.insert(name.into(), value);
    }

    /// Wholesale replacement during restore.
    pub fn replace_session_vars(&mut self, vars: BTreeMap<String, Value>) {
        self.session_vars = vars;
    }

    pub fn replace_session_meta(&mut self, meta: BTreeMap<String, Value>) {
        self.session_meta = meta;
    }

    /// Merge restored bindings into the live namespace, overwriting on
    /// collision.
    pub fn merge_bindings(&mut self, bindings: BTreeMap<String, Value>) {
        self.bindings.extend(bindings);
    }
}
