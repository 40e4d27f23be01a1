//! Runtime values held by the namespace store

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::parser::ast::FnDecl;
use crate::runtime::fault::Fault;

/// A value bound in the namespace. Everything except native helper routines
/// round-trips through serde; serializing `Native` is an error, which the
/// persistence manager turns into a skipped binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Func(FuncValue),
    #[serde(skip)]
    Native(NativeFn),
}

/// A user-defined function together with the execution count of the fragment
/// that defined it (used by introspection as the defining location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncValue {
    pub decl: FnDecl,
    pub defined_in: u64,
}

/// A helper routine registered by the tool bridge. Carries enough metadata
/// for introspection; the closure itself is opaque and not serializable.
#[derive(Clone)]
pub struct NativeFn {
    pub name: String,
    pub signature: String,
    pub doc: String,
    func: Arc<dyn Fn(&[Value]) -> Result<Value, Fault> + Send + Sync>,
}

impl NativeFn {
    pub fn new<F>(
        name: impl Into<String>,
        signature: impl Into<String>,
        doc: impl Into<String>,
        func: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: signature.into(),
            doc: doc.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, Fault> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Func(_) => "function",
            Value::Native(_) => "native function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Func(_) | Value::Native(_) => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Func(_) | Value::Native(_))
    }

    /// Unquoted text form, used by `print` and `str()`.
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.render(),
        }
    }

    /// Display rendering: strings quoted, containers recursive.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{:.1}", n)
                } else {
                    n.to_string()
                }
            }
            Value::Str(s) => format!("{:?}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.render()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k, v.render()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Func(f) => format!("<fn {}({})>", f.decl.name, f.decl.params.join(", ")),
            Value::Native(n) => format!("<native fn {}>", n.name),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_scalars() {
        assert_eq!(Value::Null.render(), "null");
        assert_eq!(Value::Int(42).render(), "42");
        assert_eq!(Value::Float(2.0).render(), "2.0");
        assert_eq!(Value::Float(2.5).render(), "2.5");
        assert_eq!(Value::Str("hi".to_string()).render(), "\"hi\"");
        assert_eq!(Value::Str("hi".to_string()).to_text(), "hi");
    }

    #[test]
    fn test_render_containers() {
        let list = Value::List(vec![Value::Int(1), Value::Str("a".to_string())]);
        assert_eq!(list.render(), "[1, \"a\"]");

        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), Value::Bool(true));
        assert_eq!(Value::Map(entries).render(), "{\"k\": true}");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Str("x".to_string()).truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(Value::Int(-1).truthy());
    }

    #[test]
    fn test_cross_numeric_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::Float(2.5));
    }

    #[test]
    fn test_native_refuses_serialization() {
        let native = Value::Native(NativeFn::new("h", "h()", "", |_| Ok(Value::Null)));
        assert!(serde_json::to_value(&native).is_err());
        assert!(serde_json::to_value(Value::Int(1)).is_ok());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut entries = BTreeMap::new();
        entries.insert("xs".to_string(), Value::List(vec![Value::Int(1), Value::Float(0.5)]));
        let original = Value::Map(entries);
        let encoded = serde_json::to_string(&original).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(original, decoded);
    }
}
