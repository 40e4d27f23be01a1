//! JSON output formatting
//!
//! Introspection replies and execution outcomes are serialized through a
//! lossy value conversion: native helpers and functions render as tagged
//! descriptors instead of failing, since output is display-only (the
//! persistence layer uses the strict serde path instead).

use serde_json::{json, Value as JsonValue};

use crate::engine::ExecutionOutcome;
use crate::introspect::{
    AttributesReply, CompletionReply, FaultReply, InspectReply, SignatureReply,
};
use crate::runtime::{Fault, Value};

/// Lossy display conversion of a runtime value into JSON.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => json!(b),
        Value::Int(n) => json!(n),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or_else(|| json!(n.to_string())),
        Value::Str(s) => json!(s),
        Value::List(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        Value::Func(f) => json!({
            "function": format!("fn {}({})", f.decl.name, f.decl.params.join(", "))
        }),
        Value::Native(n) => json!({ "native": n.name }),
    }
}

fn fault_to_json(fault: &Option<Fault>) -> JsonValue {
    match fault {
        Some(f) => json!({ "kind": f.kind, "message": f.message }),
        None => JsonValue::Null,
    }
}

pub fn outcome_to_json(outcome: &ExecutionOutcome) -> JsonValue {
    json!({
        "result": outcome.result.as_ref().map(value_to_json),
        "stdout": outcome.stdout,
        "stderr": outcome.stderr,
        "fault_before_run": fault_to_json(&outcome.fault_before_run),
        "fault_during_run": fault_to_json(&outcome.fault_during_run),
    })
}

pub fn format_json(outcome: &ExecutionOutcome) -> String {
    serde_json::to_string_pretty(&outcome_to_json(outcome)).unwrap_or_else(|_| "{}".to_string())
}

pub fn completion_to_json(reply: &CompletionReply) -> JsonValue {
    json!({
        "matched_prefix": reply.matched_prefix,
        "candidates": reply.candidates,
        "span": [reply.span.0, reply.span.1],
    })
}

pub fn inspect_to_json(reply: &InspectReply) -> JsonValue {
    json!({
        "type": reply.type_name,
        "rendering": reply.rendering,
        "docstring": reply.docstring,
        "source": reply.source,
    })
}

pub fn signature_to_json(reply: &SignatureReply) -> JsonValue {
    json!({
        "signature": reply.signature_text,
        "docstring": reply.docstring,
        "defining_location": reply.defining_location,
    })
}

pub fn attributes_to_json(reply: &AttributesReply) -> JsonValue {
    json!({
        "attributes": reply.attributes,
        "callables": reply.callables,
        "properties": reply.properties,
    })
}

pub fn fault_reply_to_json(reply: &FaultReply) -> JsonValue {
    json!({
        "present": reply.present,
        "kind": reply.kind,
        "message": reply.message,
    })
}

/// The advisory error payload: introspection and dispatch failures are
/// values, never raised across the boundary.
pub fn error_to_json(error: &crate::error::SlateError) -> JsonValue {
    json!({ "error": error.to_string() })
}
