//! Tool bridge: how external domain wrappers extend the session
//!
//! Every integration follows the same two-step protocol: register a pure
//! helper routine under a fixed name, then invoke it with a caller-chosen
//! `save_as` binding. The invocation runs through the execution engine's
//! normal admission path, so the artifact is left resident in the
//! namespace for later fragments exactly as if the caller had typed
//! `save_as = helper(args); save_as`. The call is assembled from values
//! and `save_as` must be a plain identifier; caller-controlled strings are
//! never spliced into code.

use crate::engine::Session;
use crate::error::{Result, SlateError};
use crate::runtime::{NativeFn, Value};

pub struct ToolBridge<'a> {
    session: &'a Session,
}

impl<'a> ToolBridge<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Register helper routines into the namespace. Names are fixed by the
    /// wrapper, not the caller, and must be valid identifiers.
    pub fn register(&self, helpers: Vec<NativeFn>) -> Result<()> {
        let mut bindings = Vec::with_capacity(helpers.len());
        for helper in helpers {
            if !crate::parser::is_identifier(&helper.name) {
                return Err(SlateError::ParseFault(format!(
                    "'{}' is not a valid helper name",
                    helper.name
                )));
            }
            bindings.push((helper.name.clone(), Value::Native(helper)));
        }
        self.session.set_many(bindings);
        Ok(())
    }

    /// Invoke a registered helper, bind its result under `save_as` and
    /// return the fresh value. A fault inside the helper surfaces as a
    /// `RuntimeFault` error; the artifact stays resident on success.
    pub fn invoke(&self, helper: &str, args: &[Value], save_as: &str) -> Result<Value> {
        let outcome = self.session.invoke_helper(helper, args, save_as)?;
        if let Some(fault) = outcome.fault_during_run {
            return Err(SlateError::RuntimeFault(fault.to_string()));
        }
        Ok(outcome.result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SessionConfig;
    use crate::runtime::Fault;
    use std::collections::BTreeMap;

    fn table_helper() -> NativeFn {
        NativeFn::new(
            "list_services",
            "list_services()",
            "List running services as rows of name/status maps.",
            |_args| {
                let mut row = BTreeMap::new();
                row.insert("name".to_string(), Value::Str("db".to_string()));
                row.insert("status".to_string(), Value::Str("up".to_string()));
                Ok(Value::List(vec![Value::Map(row)]))
            },
        )
    }

    #[test]
    fn test_round_trip_leaves_artifact_resident() {
        let session = Session::new(SessionConfig::default());
        let bridge = ToolBridge::new(&session);
        bridge.register(vec![table_helper()]).unwrap();

        let value = bridge.invoke("list_services", &[], "t").unwrap();

        // The caller got the value and the binding stayed behind.
        let later = session.execute("t");
        assert_eq!(later.result, Some(value));

        // Fragments can keep working with the artifact.
        let count = session.execute("t.len()");
        assert_eq!(count.result, Some(Value::Int(1)));
    }

    #[test]
    fn test_invoke_records_session_metadata() {
        let session = Session::new(SessionConfig::default());
        let bridge = ToolBridge::new(&session);
        bridge.register(vec![table_helper()]).unwrap();
        bridge.invoke("list_services", &[], "services").unwrap();

        assert!(session.get("services").is_some());
        let outcome = session.execute("services[0].name");
        assert_eq!(outcome.result, Some(Value::Str("db".to_string())));
    }

    #[test]
    fn test_helper_args_passed_as_values() {
        let session = Session::new(SessionConfig::default());
        let bridge = ToolBridge::new(&session);
        bridge
            .register(vec![NativeFn::new(
                "echo_first",
                "echo_first(value)",
                "",
                |args| Ok(args.first().cloned().unwrap_or(Value::Null)),
            )])
            .unwrap();

        // A hostile-looking string is just data, never code.
        let payload = Value::Str("\"; drop = 1; \"".to_string());
        let value = bridge.invoke("echo_first", &[payload.clone()], "echoed").unwrap();
        assert_eq!(value, payload);
        assert!(session.get("drop").is_none());
    }

    #[test]
    fn test_helper_fault_surfaces_as_runtime_fault() {
        let session = Session::new(SessionConfig::default());
        let bridge = ToolBridge::new(&session);
        bridge
            .register(vec![NativeFn::new("broken", "broken()", "", |_| {
                Err(Fault::new("RaisedFault", "backend unreachable"))
            })])
            .unwrap();

        let result = bridge.invoke("broken", &[], "out");
        assert!(matches!(result, Err(SlateError::RuntimeFault(_))));
        // No binding is left behind on fault.
        assert!(session.get("out").is_none());
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let session = Session::new(SessionConfig::default());
        let bridge = ToolBridge::new(&session);
        let result = bridge.register(vec![NativeFn::new("bad name", "", "", |_| {
            Ok(Value::Null)
        })]);
        assert!(matches!(result, Err(SlateError::ParseFault(_))));
    }

    #[test]
    fn test_registered_helper_usable_from_fragments() {
        let session = Session::new(SessionConfig::default());
        let bridge = ToolBridge::new(&session);
        bridge.register(vec![table_helper()]).unwrap();

        let outcome = session.execute("rows = list_services(); rows.len()");
        assert_eq!(outcome.result, Some(Value::Int(1)));
    }
}
