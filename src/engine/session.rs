//! The session: single-flight execution over the shared shell
//!
//! `Session` is the boundary the transport/tool layer talks to. Fragment
//! faults are data inside `ExecutionOutcome`, never errors; introspection
//! reads share the shell lock but skip the admission gate, so they are
//! never queued behind waiting fragments.

use std::path::PathBuf;
use std::sync::RwLock;

use crate::commands::{self, CommandHelp, CommandListing, CommandRegistry, InstallReport};
use crate::engine::eval::{Capture, Interp};
use crate::engine::gate::Gate;
use crate::engine::shell::Shell;
use crate::error::{Result, SlateError};
use crate::introspect::{
    self, AttributesReply, CompletionReply, FaultReply, InspectReply, SignatureReply,
};
use crate::namespace::NamespaceStore;
use crate::parser::{is_identifier, parse_program, Program};
use crate::persist::PersistenceManager;
use crate::runtime::{Fault, Value};

/// Runtime configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory holding the durable snapshot.
    pub state_dir: PathBuf,
    /// Package installer program used by the `install` command.
    pub installer: String,
    /// Whether effectful commands (`install`, `writefile`) are allowed.
    pub allow_effects: bool,
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".slate_session"),
            installer: "pip".to_string(),
            allow_effects: false,
            verbose: false,
        }
    }
}

/// Everything observable from running one fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// Value of a trailing bare expression; absent otherwise (a trailing
    /// `null` is also reported as absent, matching scratchpad conventions).
    pub result: Option<Value>,
    pub stdout: String,
    pub stderr: String,
    /// The fragment failed to parse; the namespace is untouched.
    pub fault_before_run: Option<Fault>,
    /// The fragment raised during evaluation; bindings made before the
    /// fault remain (partial-effect semantics, as in any REPL).
    pub fault_during_run: Option<Fault>,
}

impl ExecutionOutcome {
    fn empty() -> Self {
        Self {
            result: None,
            stdout: String::new(),
            stderr: String::new(),
            fault_before_run: None,
            fault_during_run: None,
        }
    }

    fn parse_fault(message: String) -> Self {
        Self {
            fault_before_run: Some(Fault::new("ParseFault", message)),
            ..Self::empty()
        }
    }

    pub fn ok(&self) -> bool {
        self.fault_before_run.is_none() && self.fault_during_run.is_none()
    }
}

/// Run an already-parsed fragment against a locked shell. Shared between
/// `Session::execute` and commands that run code while already holding the
/// admission gate (e.g. `%%time`).
pub(crate) fn run_parsed(shell: &mut Shell, code: &str, program: &Program) -> ExecutionOutcome {
    let exec_no = shell.begin_fragment(code);
    let mut capture = Capture::default();
    let result = {
        let mut interp = Interp::new(shell.store_mut(), &mut capture, exec_no);
        interp.run(program)
    };

    let mut outcome = ExecutionOutcome {
        stdout: capture.stdout.trim_end().to_string(),
        stderr: capture.stderr.trim_end().to_string(),
        ..ExecutionOutcome::empty()
    };

    match result {
        Ok(Some(value)) if value != Value::Null => {
            shell.finish_with_result(value.clone());
            outcome.result = Some(value);
        }
        Ok(_) => {}
        Err(fault) => {
            log::debug!("fragment #{} faulted: {}", exec_no, fault);
            shell.record_fault(fault.clone());
            outcome.fault_during_run = Some(fault);
        }
    }
    outcome
}

/// Parse and run a fragment against a locked shell.
pub(crate) fn run_fragment(shell: &mut Shell, code: &str) -> ExecutionOutcome {
    match parse_program(code) {
        Ok(program) => run_parsed(shell, code, &program),
        Err(SlateError::ParseFault(message)) => ExecutionOutcome::parse_fault(message),
        Err(other) => ExecutionOutcome::parse_fault(other.to_string()),
    }
}

/// A live session: one shared namespace, one fragment in flight at a time.
pub struct Session {
    shell: RwLock<Shell>,
    gate: Gate,
    config: SessionConfig,
    commands: CommandRegistry,
    persistence: PersistenceManager,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let persistence = PersistenceManager::new(config.state_dir.clone());
        Self {
            shell: RwLock::new(Shell::new()),
            gate: Gate::new(),
            config,
            commands: CommandRegistry::builtin(),
            persistence,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Execute a fragment. Parse faults return immediately without taking
    /// the admission gate; everything else is serialized FIFO.
    pub fn execute(&self, code: &str) -> ExecutionOutcome {
        let program = match parse_program(code) {
            Ok(program) => program,
            Err(SlateError::ParseFault(message)) => {
                return ExecutionOutcome::parse_fault(message)
            }
            Err(other) => return ExecutionOutcome::parse_fault(other.to_string()),
        };

        let _pass = self.gate.enter();
        let mut shell = self.shell.write().unwrap();
        run_parsed(&mut shell, code, &program)
    }

    /// Invoke a registered helper routine and leave the result bound under
    /// `save_as`. This is the tool-bridge execution path: same admission,
    /// same history recording as `execute`, but the call is assembled from
    /// values instead of a templated code string, so caller-supplied
    /// identifiers cannot smuggle code in.
    pub fn invoke_helper(
        &self,
        helper: &str,
        args: &[Value],
        save_as: &str,
    ) -> Result<ExecutionOutcome> {
        if !is_identifier(save_as) || NamespaceStore::is_reserved(save_as) {
            return Err(SlateError::ParseFault(format!(
                "'{}' is not a valid binding name",
                save_as
            )));
        }

        let _pass = self.gate.enter();
        let mut shell = self.shell.write().unwrap();

        let callee = shell
            .store()
            .get(helper)
            .cloned()
            .ok_or_else(|| SlateError::NotFound(format!("helper '{}' is not registered", helper)))?;
        if !callee.is_callable() {
            return Err(SlateError::NotFound(format!(
                "'{}' is bound but not callable",
                helper
            )));
        }

        let rendered = render_invocation(helper, args, save_as);
        let exec_no = shell.begin_fragment(&rendered);

        let mut capture = Capture::default();
        let result = {
            let mut interp = Interp::new(shell.store_mut(), &mut capture, exec_no);
            interp.call(&callee, args.to_vec())
        };

        let mut outcome = ExecutionOutcome {
            stdout: capture.stdout.trim_end().to_string(),
            stderr: capture.stderr.trim_end().to_string(),
            ..ExecutionOutcome::empty()
        };

        match result {
            Ok(value) => {
                shell.store_mut().set(save_as, value.clone());
                shell
                    .store_mut()
                    .set_session_var(save_as, value.clone());
                let provenance = provenance_record(helper, &value);
                shell.store_mut().set_session_meta(save_as, provenance);

                if value != Value::Null {
                    shell.finish_with_result(value.clone());
                    outcome.result = Some(value);
                }
            }
            Err(fault) => {
                shell.record_fault(fault.clone());
                outcome.fault_during_run = Some(fault);
            }
        }
        Ok(outcome)
    }

    /// Inject bindings (helper routines, fixtures) without executing code.
    pub fn set_many(&self, bindings: Vec<(String, Value)>) {
        let mut shell = self.shell.write().unwrap();
        shell.store_mut().set_many(bindings);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let shell = self.shell.read().unwrap();
        shell.store().get(name).cloned()
    }

    pub fn list_names(&self, filter: Option<&str>) -> Vec<String> {
        let shell = self.shell.read().unwrap();
        shell.store().list_names(filter)
    }

    pub fn complete(&self, text: &str, cursor: Option<usize>) -> CompletionReply {
        let shell = self.shell.read().unwrap();
        introspect::complete(&shell, text, cursor)
    }

    pub fn inspect(&self, name: &str, detail: u8) -> Result<InspectReply> {
        let shell = self.shell.read().unwrap();
        introspect::inspect(&shell, name, detail)
    }

    pub fn signature(&self, name: &str) -> Result<SignatureReply> {
        let shell = self.shell.read().unwrap();
        introspect::signature(&shell, name)
    }

    pub fn list_attributes(
        &self,
        name: &str,
        pattern: Option<&str>,
        include_private: bool,
    ) -> Result<AttributesReply> {
        let shell = self.shell.read().unwrap();
        introspect::list_attributes(&shell, name, pattern, include_private)
    }

    pub fn last_fault(&self) -> FaultReply {
        let shell = self.shell.read().unwrap();
        introspect::last_fault(&shell)
    }

    /// Dispatch an extension command. Side-effecting commands share the
    /// fragment admission gate.
    pub fn run_command(
        &self,
        name: &str,
        line_args: &str,
        block_body: Option<&str>,
    ) -> Result<Value> {
        let _pass = self.gate.enter();
        let mut shell = self.shell.write().unwrap();
        self.commands
            .dispatch(&mut shell, &self.config, name, line_args, block_body)
    }

    /// Lock-free discovery: command names by form.
    pub fn list_commands(&self) -> CommandListing {
        self.commands.listing()
    }

    /// Lock-free discovery: help for one command.
    pub fn describe_command(&self, name: &str, block_form: bool) -> CommandHelp {
        self.commands.describe(name, block_form)
    }

    /// Install a dependency through the same admission gate as fragments.
    pub fn install(&self, spec: &str, upgrade: bool) -> InstallReport {
        let _pass = self.gate.enter();
        commands::run_install(&self.config, spec, upgrade)
    }

    /// Best-effort snapshot of the current session state.
    pub fn save(&self) {
        let shell = self.shell.read().unwrap();
        self.persistence.save(&shell);
    }

    /// Restore a prior snapshot, if any. Must run before the first
    /// caller-visible operation.
    pub fn restore(&self) {
        let mut shell = self.shell.write().unwrap();
        self.persistence.restore(&mut shell);
    }
}

/// Provenance metadata recorded under `session_meta` for a bridge artifact.
fn provenance_record(helper: &str, value: &Value) -> Value {
    let mut record = std::collections::BTreeMap::new();
    record.insert("helper".to_string(), Value::Str(helper.to_string()));
    record.insert(
        "saved_at".to_string(),
        Value::Str(chrono::Utc::now().to_rfc3339()),
    );
    record.insert(
        "type".to_string(),
        Value::Str(value.type_name().to_string()),
    );
    Value::Map(record)
}

/// Human-readable rendering of a helper invocation for the input history.
fn render_invocation(helper: &str, args: &[Value], save_as: &str) -> String {
    let rendered_args: Vec<String> = args.iter().map(|v| v.render()).collect();
    format!(
        "{} = {}({})\n{}",
        save_as,
        helper,
        rendered_args.join(", "),
        save_as
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_session() -> Session {
        Session::new(SessionConfig::default())
    }

    #[test]
    fn test_sequential_fragments_share_bindings() {
        let session = test_session();
        let first = session.execute("x = 1");
        assert!(first.ok());
        assert!(first.result.is_none());

        let second = session.execute("x + 1");
        assert_eq!(second.result, Some(Value::Int(2)));
    }

    #[test]
    fn test_parse_fault_leaves_namespace_untouched() {
        let session = test_session();
        session.execute("x = 1");
        let count_before = session.execute("x").result;

        let broken = session.execute("x = = 2");
        assert!(broken.fault_before_run.is_some());
        assert!(broken.fault_during_run.is_none());
        assert!(broken.result.is_none());

        assert_eq!(session.execute("x").result, count_before);
        // Parse faults are not recorded as runtime faults.
        assert!(!session.last_fault().present);
    }

    #[test]
    fn test_runtime_fault_keeps_partial_effect() {
        let session = test_session();
        let outcome = session.execute("y = 2; raise \"boom\"");
        assert!(outcome.fault_before_run.is_none());
        let fault = outcome.fault_during_run.expect("fault expected");
        assert_eq!(fault.kind, "RaisedFault");

        assert_eq!(session.execute("y").result, Some(Value::Int(2)));

        let reply = session.last_fault();
        assert!(reply.present);
        assert_eq!(reply.kind.as_deref(), Some("RaisedFault"));
    }

    #[test]
    fn test_stdout_capture_trimmed() {
        let session = test_session();
        let outcome = session.execute("print(\"a\")\nprint(\"b\")");
        assert_eq!(outcome.stdout, "a\nb");
        assert!(outcome.stderr.is_empty());
    }

    #[test]
    fn test_trailing_null_is_absent() {
        let session = test_session();
        let outcome = session.execute("print(\"side effect\")");
        assert!(outcome.result.is_none());
        assert_eq!(outcome.stdout, "side effect");
    }

    #[test]
    fn test_history_accessors_visible_to_fragments() {
        let session = test_session();
        session.execute("2 + 2");
        let outcome = session.execute("_ * 10");
        assert_eq!(outcome.result, Some(Value::Int(40)));
    }

    #[test]
    fn test_list_names_hides_reserved_and_private() {
        let session = test_session();
        session.set_many(vec![
            ("x".to_string(), Value::Int(1)),
            ("_internal".to_string(), Value::Int(2)),
        ]);
        assert_eq!(session.list_names(None), vec!["x".to_string()]);
    }

    #[test]
    fn test_concurrent_submissions_serialized() {
        let session = Arc::new(test_session());
        session.execute("n = 0");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let session = Arc::clone(&session);
            handles.push(std::thread::spawn(move || {
                let outcome = session.execute("n = n + 1");
                assert!(outcome.ok());
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Serialized read-modify-write: no lost updates.
        assert_eq!(session.execute("n").result, Some(Value::Int(16)));
    }

    #[test]
    fn test_later_submission_sees_earlier_binding() {
        let session = Arc::new(test_session());

        let writer = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.execute("shared = 7"))
        };
        writer.join().unwrap();

        let reader = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.execute("shared + 1"))
        };
        assert_eq!(reader.join().unwrap().result, Some(Value::Int(8)));
    }

    #[test]
    fn test_invoke_helper_rejects_bad_binding_names() {
        use crate::runtime::NativeFn;

        let session = test_session();
        session.set_many(vec![(
            "probe".to_string(),
            Value::Native(NativeFn::new("probe", "probe()", "", |_| Ok(Value::Int(1)))),
        )]);

        for bad in ["1x", "a b", "t; drop", "In", "fn"] {
            assert!(session.invoke_helper("probe", &[], bad).is_err(), "{}", bad);
        }

        let outcome = session.invoke_helper("probe", &[], "t").unwrap();
        assert_eq!(outcome.result, Some(Value::Int(1)));
    }

    #[test]
    fn test_invoke_helper_unknown_is_not_found() {
        let session = test_session();
        match session.invoke_helper("ghost", &[], "t") {
            Err(SlateError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }
}
