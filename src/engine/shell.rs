//! Shell state: the namespace store plus execution history
//!
//! The shell seeds and maintains the reserved bindings (`In`, `Out`, the
//! exit/quit sentinels, the `shell` self-reference) and the underscore
//! history accessors (`_`, `__`, `___` for results, `_i`, `_ii`, `_iii`
//! for inputs), mirroring what interactive scratchpad shells expose.

use std::collections::BTreeMap;

use crate::namespace::NamespaceStore;
use crate::runtime::{Fault, Value};

const EXIT_SENTINEL: &str = "<leave the session from the host process or REPL>";

#[derive(Debug, Default)]
pub struct Shell {
    store: NamespaceStore,
    exec_count: u64,
    inputs: Vec<String>,
    last_fault: Option<Fault>,
}

impl Shell {
    pub fn new() -> Self {
        let mut shell = Self::default();
        shell.seed_reserved();
        shell
    }

    fn seed_reserved(&mut self) {
        self.store.set("In", Value::List(Vec::new()));
        self.store.set("Out", Value::Map(BTreeMap::new()));
        self.store.set("exit", Value::Str(EXIT_SENTINEL.to_string()));
        self.store.set("quit", Value::Str(EXIT_SENTINEL.to_string()));
        self.store.set(
            "shell",
            Value::Str(format!("<slate shell v{}>", env!("CARGO_PKG_VERSION"))),
        );
    }

    pub fn store(&self) -> &NamespaceStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NamespaceStore {
        &mut self.store
    }

    pub fn exec_count(&self) -> u64 {
        self.exec_count
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Record an accepted (parseable) fragment: bump the execution count,
    /// append to the input history and rotate the input accessors. Parse
    /// faults never reach this, so they leave no trace in the store.
    pub fn begin_fragment(&mut self, code: &str) -> u64 {
        self.exec_count += 1;
        self.inputs.push(code.to_string());
        if let Some(Value::List(items)) = self.store.get_mut("In") {
            items.push(Value::Str(code.to_string()));
        }
        self.rotate(["_i", "_ii", "_iii"], Value::Str(code.to_string()));
        self.exec_count
    }

    /// Record a produced result: store it under `Out` keyed by execution
    /// count and rotate the result accessors.
    pub fn finish_with_result(&mut self, value: Value) {
        let key = self.exec_count.to_string();
        if let Some(Value::Map(entries)) = self.store.get_mut("Out") {
            entries.insert(key, value.clone());
        }
        self.rotate(["_", "__", "___"], value);
    }

    fn rotate(&mut self, names: [&str; 3], newest: Value) {
        let first = self.store.get(names[0]).cloned();
        let second = self.store.get(names[1]).cloned();
        if let Some(v) = second {
            self.store.set(names[2], v);
        }
        if let Some(v) = first {
            self.store.set(names[1], v);
        }
        self.store.set(names[0], newest);
    }

    pub fn record_fault(&mut self, fault: Fault) {
        self.last_fault = Some(fault);
    }

    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }

    /// Clear all bindings and reseed the reserved machinery. Input history
    /// and the execution counter are kept so fragment numbering stays
    /// monotonic across a reset.
    pub fn reset(&mut self) {
        self.store.clear_bindings();
        self.seed_reserved();
        self.last_fault = None;
    }
}
