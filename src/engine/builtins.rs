//! Builtin functions, methods and properties of the fragment language
//!
//! The method/property tables double as the introspection attribute model:
//! `list_attributes` partitions a value's surface using the same tables the
//! evaluator dispatches through.

use std::collections::BTreeMap;

use crate::engine::eval::Capture;
use crate::runtime::{Fault, Value};

/// Names callable as plain functions. Resolved after the namespace, so a
/// user binding shadows a builtin.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "eprint", "float", "int", "len", "print", "range", "str", "sum", "type",
];

/// Methods invocable on a value of the given type.
pub fn type_methods(value: &Value) -> &'static [&'static str] {
    match value {
        Value::Str(_) => &[
            "contains",
            "ends_with",
            "len",
            "lower",
            "replace",
            "split",
            "starts_with",
            "trim",
            "upper",
        ],
        Value::List(_) => &[
            "contains", "first", "join", "last", "len", "reversed", "sorted",
        ],
        Value::Map(_) => &["get", "has", "keys", "len", "values"],
        Value::Int(_) | Value::Float(_) => &["abs"],
        _ => &[],
    }
}

/// Property-like attributes readable without a call.
pub fn type_properties(value: &Value) -> &'static [&'static str] {
    match value {
        Value::Str(_) | Value::List(_) | Value::Map(_) => &["len"],
        Value::Func(_) | Value::Native(_) => &["doc", "name", "signature"],
        _ => &[],
    }
}

/// Dispatch a builtin function. Returns `None` when `name` is not a
/// builtin, so the caller can report an unbound name instead.
pub fn call_builtin(
    name: &str,
    args: &[Value],
    capture: &mut Capture,
) -> Option<Result<Value, Fault>> {
    let result = match name {
        "print" => {
            let line: Vec<String> = args.iter().map(|v| v.to_text()).collect();
            capture.stdout.push_str(&line.join(" "));
            capture.stdout.push('\n');
            Ok(Value::Null)
        }
        "eprint" => {
            let line: Vec<String> = args.iter().map(|v| v.to_text()).collect();
            capture.stderr.push_str(&line.join(" "));
            capture.stderr.push('\n');
            Ok(Value::Null)
        }
        "len" => single(args, "len").and_then(value_len),
        "type" => single(args, "type").map(|v| Value::Str(v.type_name().to_string())),
        "str" => single(args, "str").map(|v| Value::Str(v.to_text())),
        "int" => single(args, "int").and_then(to_int),
        "float" => single(args, "float").and_then(to_float),
        "range" => builtin_range(args),
        "sum" => single(args, "sum").and_then(builtin_sum),
        _ => return None,
    };
    Some(result)
}

fn single<'a>(args: &'a [Value], name: &str) -> Result<&'a Value, Fault> {
    match args {
        [v] => Ok(v),
        _ => Err(Fault::arity(name, 1, args.len())),
    }
}

fn value_len(value: &Value) -> Result<Value, Fault> {
    match value {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Map(entries) => Ok(Value::Int(entries.len() as i64)),
        other => Err(Fault::type_fault(format!(
            "len() is not supported for '{}' values",
            other.type_name()
        ))),
    }
}

fn to_int(value: &Value) -> Result<Value, Fault> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => Ok(Value::Int(*n as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Fault::type_fault(format!("cannot convert {:?} to int", s))),
        other => Err(Fault::type_fault(format!(
            "cannot convert '{}' value to int",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> Result<Value, Fault> {
    match value {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(n) => Ok(Value::Float(*n)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Fault::type_fault(format!("cannot convert {:?} to float", s))),
        other => Err(Fault::type_fault(format!(
            "cannot convert '{}' value to float",
            other.type_name()
        ))),
    }
}

fn builtin_range(args: &[Value]) -> Result<Value, Fault> {
    let (start, end) = match args {
        [Value::Int(end)] => (0, *end),
        [Value::Int(start), Value::Int(end)] => (*start, *end),
        _ => {
            return Err(Fault::type_fault(
                "range() takes one or two int arguments".to_string(),
            ))
        }
    };
    Ok(Value::List((start..end).map(Value::Int).collect()))
}

fn builtin_sum(value: &Value) -> Result<Value, Fault> {
    let items = match value {
        Value::List(items) => items,
        other => {
            return Err(Fault::type_fault(format!(
                "sum() expects a list, got '{}'",
                other.type_name()
            )))
        }
    };

    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut saw_float = false;
    for item in items {
        match item {
            Value::Int(n) => {
                int_total += n;
                float_total += *n as f64;
            }
            Value::Float(n) => {
                saw_float = true;
                float_total += n;
            }
            other => {
                return Err(Fault::type_fault(format!(
                    "sum() expects numbers, got '{}'",
                    other.type_name()
                )))
            }
        }
    }
    if saw_float {
        Ok(Value::Float(float_total))
    } else {
        Ok(Value::Int(int_total))
    }
}

/// Read a property-like attribute. Returns `None` when the value has no
/// such property.
pub fn get_property(value: &Value, name: &str) -> Option<Value> {
    match (value, name) {
        (Value::Str(_) | Value::List(_) | Value::Map(_), "len") => {
            value_len(value).ok()
        }
        (Value::Func(f), "name") => Some(Value::Str(f.decl.name.clone())),
        (Value::Func(f), "doc") => Some(match &f.decl.doc {
            Some(doc) => Value::Str(doc.clone()),
            None => Value::Null,
        }),
        (Value::Func(f), "signature") => Some(Value::Str(format!(
            "fn {}({})",
            f.decl.name,
            f.decl.params.join(", ")
        ))),
        (Value::Native(n), "name") => Some(Value::Str(n.name.clone())),
        (Value::Native(n), "doc") => Some(Value::Str(n.doc.clone())),
        (Value::Native(n), "signature") => Some(Value::Str(n.signature.clone())),
        _ => None,
    }
}

/// Dispatch a builtin method call on a receiver value.
pub fn call_method(recv: &Value, name: &str, args: &[Value]) -> Result<Value, Fault> {
    match recv {
        Value::Str(s) => str_method(s, name, args),
        Value::List(items) => list_method(items, name, args),
        Value::Map(entries) => map_method(entries, name, args),
        Value::Int(n) => match name {
            "abs" => Ok(Value::Int(n.abs())),
            _ => Err(Fault::attribute(recv.type_name(), name)),
        },
        Value::Float(n) => match name {
            "abs" => Ok(Value::Float(n.abs())),
            _ => Err(Fault::attribute(recv.type_name(), name)),
        },
        other => Err(Fault::attribute(other.type_name(), name)),
    }
}

fn expect_str(args: &[Value], method: &str) -> Result<String, Fault> {
    match args {
        [Value::Str(s)] => Ok(s.clone()),
        [other] => Err(Fault::type_fault(format!(
            "{}() expects a str argument, got '{}'",
            method,
            other.type_name()
        ))),
        _ => Err(Fault::arity(method, 1, args.len())),
    }
}

fn str_method(s: &str, name: &str, args: &[Value]) -> Result<Value, Fault> {
    match name {
        "len" => Ok(Value::Int(s.chars().count() as i64)),
        "upper" => no_args(args, name).map(|_| Value::Str(s.to_uppercase())),
        "lower" => no_args(args, name).map(|_| Value::Str(s.to_lowercase())),
        "trim" => no_args(args, name).map(|_| Value::Str(s.trim().to_string())),
        "contains" => expect_str(args, name).map(|needle| Value::Bool(s.contains(&needle))),
        "starts_with" => expect_str(args, name).map(|p| Value::Bool(s.starts_with(&p))),
        "ends_with" => expect_str(args, name).map(|p| Value::Bool(s.ends_with(&p))),
        "split" => expect_str(args, name).map(|sep| {
            Value::List(
                s.split(&sep)
                    .map(|part| Value::Str(part.to_string()))
                    .collect(),
            )
        }),
        "replace" => match args {
            [Value::Str(from), Value::Str(to)] => Ok(Value::Str(s.replace(from, to))),
            _ => Err(Fault::type_fault(
                "replace() expects two str arguments".to_string(),
            )),
        },
        _ => Err(Fault::attribute("str", name)),
    }
}

fn list_method(items: &[Value], name: &str, args: &[Value]) -> Result<Value, Fault> {
    match name {
        "len" => Ok(Value::Int(items.len() as i64)),
        "first" => no_args(args, name).map(|_| items.first().cloned().unwrap_or(Value::Null)),
        "last" => no_args(args, name).map(|_| items.last().cloned().unwrap_or(Value::Null)),
        "contains" => match args {
            [needle] => Ok(Value::Bool(items.contains(needle))),
            _ => Err(Fault::arity(name, 1, args.len())),
        },
        "join" => {
            let sep = expect_str(args, name)?;
            let parts: Vec<String> = items.iter().map(|v| v.to_text()).collect();
            Ok(Value::Str(parts.join(&sep)))
        }
        "reversed" => no_args(args, name).map(|_| {
            let mut out: Vec<Value> = items.to_vec();
            out.reverse();
            Value::List(out)
        }),
        "sorted" => {
            no_args(args, name)?;
            sorted_list(items)
        }
        _ => Err(Fault::attribute("list", name)),
    }
}

fn sorted_list(items: &[Value]) -> Result<Value, Fault> {
    let mut out: Vec<Value> = items.to_vec();
    let all_numbers = out
        .iter()
        .all(|v| matches!(v, Value::Int(_) | Value::Float(_)));
    let all_strings = out.iter().all(|v| matches!(v, Value::Str(_)));

    if all_numbers {
        out.sort_by(|a, b| {
            let fa = as_f64(a);
            let fb = as_f64(b);
            fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else if all_strings {
        out.sort_by(|a, b| match (a, b) {
            (Value::Str(sa), Value::Str(sb)) => sa.cmp(sb),
            _ => std::cmp::Ordering::Equal,
        });
    } else {
        return Err(Fault::type_fault(
            "sorted() requires a list of all numbers or all strings".to_string(),
        ));
    }
    Ok(Value::List(out))
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => 0.0,
    }
}

fn map_method(
    entries: &BTreeMap<String, Value>,
    name: &str,
    args: &[Value],
) -> Result<Value, Fault> {
    match name {
        "len" => Ok(Value::Int(entries.len() as i64)),
        "keys" => no_args(args, name).map(|_| {
            Value::List(entries.keys().map(|k| Value::Str(k.clone())).collect())
        }),
        "values" => no_args(args, name).map(|_| Value::List(entries.values().cloned().collect())),
        "has" => expect_str(args, name).map(|k| Value::Bool(entries.contains_key(&k))),
        "get" => match args {
            [Value::Str(k)] => Ok(entries.get(k).cloned().unwrap_or(Value::Null)),
            [Value::Str(k), default] => Ok(entries.get(k).cloned().unwrap_or_else(|| default.clone())),
            _ => Err(Fault::type_fault(
                "get() expects a str key and an optional default".to_string(),
            )),
        },
        _ => Err(Fault::attribute("map", name)),
    }
}

fn no_args(args: &[Value], method: &str) -> Result<(), Fault> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(Fault::arity(method, 0, args.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_captures() {
        let mut capture = Capture::default();
        let result = call_builtin(
            "print",
            &[Value::Str("hi".to_string()), Value::Int(2)],
            &mut capture,
        )
        .unwrap();
        assert_eq!(result.unwrap(), Value::Null);
        assert_eq!(capture.stdout, "hi 2\n");
        assert!(capture.stderr.is_empty());
    }

    #[test]
    fn test_unknown_builtin_is_none() {
        let mut capture = Capture::default();
        assert!(call_builtin("frobnicate", &[], &mut capture).is_none());
    }

    #[test]
    fn test_range_and_sum() {
        let mut capture = Capture::default();
        let range = call_builtin("range", &[Value::Int(4)], &mut capture)
            .unwrap()
            .unwrap();
        let total = call_builtin("sum", &[range], &mut capture).unwrap().unwrap();
        assert_eq!(total, Value::Int(6));
    }

    #[test]
    fn test_str_methods() {
        let s = Value::Str("a,b,c".to_string());
        let parts = call_method(&s, "split", &[Value::Str(",".to_string())]).unwrap();
        match parts {
            Value::List(items) => assert_eq!(items.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }
        assert_eq!(
            call_method(&s, "upper", &[]).unwrap(),
            Value::Str("A,B,C".to_string())
        );
    }

    #[test]
    fn test_map_get_with_default() {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), Value::Int(1));
        let m = Value::Map(entries);
        assert_eq!(
            call_method(&m, "get", &[Value::Str("a".to_string())]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            call_method(
                &m,
                "get",
                &[Value::Str("zz".to_string()), Value::Int(9)]
            )
            .unwrap(),
            Value::Int(9)
        );
    }

    #[test]
    fn test_unknown_method_is_attribute_fault() {
        let fault = call_method(&Value::Int(1), "upper", &[]).unwrap_err();
        assert_eq!(fault.kind, "AttributeFault");
    }

    #[test]
    fn test_sorted_rejects_mixed() {
        let items = vec![Value::Int(1), Value::Str("a".to_string())];
        assert!(sorted_list(&items).is_err());
        let sorted = sorted_list(&[Value::Int(3), Value::Int(1)]).unwrap();
        assert_eq!(sorted, Value::List(vec![Value::Int(1), Value::Int(3)]));
    }
}
