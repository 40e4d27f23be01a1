//! Structured fault values surfaced by the execution engine

use serde::{Deserialize, Serialize};

/// A fault raised while evaluating a fragment. Faults are data, not
/// exceptions: they travel inside `ExecutionOutcome` and introspection
/// replies, never across a boundary as a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Fault from a `raise` statement.
    pub fn raised(message: impl Into<String>) -> Self {
        Self::new("RaisedFault", message)
    }

    /// Unbound name reference.
    pub fn name(name: &str) -> Self {
        Self::new("NameFault", format!("name '{}' is not defined", name))
    }

    /// Operation applied to an unsupported type.
    pub fn type_fault(message: impl Into<String>) -> Self {
        Self::new("TypeFault", message)
    }

    /// Missing attribute or method.
    pub fn attribute(type_name: &str, attr: &str) -> Self {
        Self::new(
            "AttributeFault",
            format!("'{}' value has no attribute '{}'", type_name, attr),
        )
    }

    /// Out-of-range index or missing key.
    pub fn index(message: impl Into<String>) -> Self {
        Self::new("IndexFault", message)
    }

    /// Wrong number of call arguments.
    pub fn arity(callee: &str, expected: usize, got: usize) -> Self {
        Self::new(
            "TypeFault",
            format!("{}() takes {} argument(s), got {}", callee, expected, got),
        )
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
