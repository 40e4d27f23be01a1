//! Built-in extension commands

use std::time::Instant;

use regex::Regex;

use crate::commands::install;
use crate::engine::session::run_fragment;
use crate::engine::{SessionConfig, Shell};
use crate::error::{Result, SlateError};
use crate::runtime::Value;

pub(super) fn cmd_install(
    _shell: &mut Shell,
    config: &SessionConfig,
    line_args: &str,
) -> Result<Value> {
    let mut upgrade = false;
    let mut spec_parts = Vec::new();
    for token in line_args.split_whitespace() {
        match token {
            "--upgrade" | "-U" => upgrade = true,
            other => spec_parts.push(other),
        }
    }
    let spec = spec_parts.join(" ");
    Ok(install::run_install(config, &spec, upgrade).to_value())
}

pub(super) fn cmd_who(
    shell: &mut Shell,
    _config: &SessionConfig,
    line_args: &str,
) -> Result<Value> {
    let filter = line_args.trim();
    let filter = if filter.is_empty() { None } else { Some(filter) };
    let names = shell.store().list_names(filter);
    Ok(Value::Str(names.join(" ")))
}

pub(super) fn cmd_history(
    shell: &mut Shell,
    _config: &SessionConfig,
    line_args: &str,
) -> Result<Value> {
    let range = line_args.trim();
    let inputs = shell.inputs();
    let total = inputs.len();

    let (start, end) = if range.is_empty() {
        (1, total)
    } else {
        let single = Regex::new(r"^(\d+)$").unwrap();
        let span = Regex::new(r"^(\d+)-(\d+)$").unwrap();
        if let Some(caps) = single.captures(range) {
            let n: usize = caps[1].parse().unwrap_or(0);
            (n, n)
        } else if let Some(caps) = span.captures(range) {
            let a: usize = caps[1].parse().unwrap_or(0);
            let b: usize = caps[2].parse().unwrap_or(0);
            (a, b)
        } else {
            return Err(SlateError::RuntimeFault(format!(
                "invalid history range '{}'",
                range
            )));
        }
    };

    let mut lines = Vec::new();
    for n in start..=end.min(total) {
        if n == 0 {
            continue;
        }
        if let Some(code) = inputs.get(n - 1) {
            lines.push(format!("{}: {}", n, code));
        }
    }
    Ok(Value::Str(lines.join("\n")))
}

pub(super) fn cmd_reset(
    shell: &mut Shell,
    _config: &SessionConfig,
    _line_args: &str,
) -> Result<Value> {
    shell.reset();
    Ok(Value::Str("namespace reset".to_string()))
}

pub(super) fn cmd_time(
    shell: &mut Shell,
    _config: &SessionConfig,
    _line_args: &str,
    body: &str,
) -> Result<Value> {
    let started = Instant::now();
    let outcome = run_fragment(shell, body);
    let elapsed = started.elapsed();

    let status = if let Some(fault) = &outcome.fault_before_run {
        format!("parse fault: {}", fault.message)
    } else if let Some(fault) = &outcome.fault_during_run {
        format!("faulted: {}", fault)
    } else {
        "ok".to_string()
    };
    Ok(Value::Str(format!(
        "{} ({:.3} ms)",
        status,
        elapsed.as_secs_f64() * 1000.0
    )))
}

pub(super) fn cmd_writefile(
    _shell: &mut Shell,
    config: &SessionConfig,
    line_args: &str,
    body: &str,
) -> Result<Value> {
    if !config.allow_effects {
        return Err(SlateError::CommandRefused(
            "effectful commands are disabled; start the session with --allow-effects".to_string(),
        ));
    }
    let path = line_args.trim();
    if path.is_empty() {
        return Err(SlateError::RuntimeFault(
            "writefile needs a target path".to_string(),
        ));
    }
    std::fs::write(path, body)?;
    Ok(Value::Str(format!("wrote {} bytes to {}", body.len(), path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandRegistry;

    fn setup() -> (Shell, SessionConfig, CommandRegistry) {
        (
            Shell::new(),
            SessionConfig::default(),
            CommandRegistry::builtin(),
        )
    }

    #[test]
    fn test_who_lists_user_bindings() {
        let (mut shell, config, registry) = setup();
        run_fragment(&mut shell, "alpha = 1; beta = 2");
        let result = registry
            .dispatch(&mut shell, &config, "who", "", None)
            .unwrap();
        assert_eq!(result, Value::Str("alpha beta".to_string()));

        let filtered = registry
            .dispatch(&mut shell, &config, "who", "alp", None)
            .unwrap();
        assert_eq!(filtered, Value::Str("alpha".to_string()));
    }

    #[test]
    fn test_history_ranges() {
        let (mut shell, config, registry) = setup();
        run_fragment(&mut shell, "a = 1");
        run_fragment(&mut shell, "b = 2");
        run_fragment(&mut shell, "c = 3");

        let all = registry
            .dispatch(&mut shell, &config, "history", "", None)
            .unwrap();
        assert_eq!(
            all,
            Value::Str("1: a = 1\n2: b = 2\n3: c = 3".to_string())
        );

        let span = registry
            .dispatch(&mut shell, &config, "history", "2-3", None)
            .unwrap();
        assert_eq!(span, Value::Str("2: b = 2\n3: c = 3".to_string()));

        let single = registry
            .dispatch(&mut shell, &config, "history", "2", None)
            .unwrap();
        assert_eq!(single, Value::Str("2: b = 2".to_string()));

        let bad = registry.dispatch(&mut shell, &config, "history", "x-y", None);
        assert!(matches!(bad, Err(SlateError::RuntimeFault(_))));
    }

    #[test]
    fn test_reset_clears_bindings() {
        let (mut shell, config, registry) = setup();
        run_fragment(&mut shell, "x = 1");
        registry
            .dispatch(&mut shell, &config, "reset", "", None)
            .unwrap();
        assert!(shell.store().get("x").is_none());
    }

    #[test]
    fn test_time_runs_body_against_namespace() {
        let (mut shell, config, registry) = setup();
        let result = registry
            .dispatch(&mut shell, &config, "time", "", Some("timed = 41 + 1"))
            .unwrap();
        match result {
            Value::Str(report) => assert!(report.starts_with("ok"), "{}", report),
            other => panic!("expected str, got {:?}", other),
        }
        assert_eq!(shell.store().get("timed"), Some(&Value::Int(42)));
    }

    #[test]
    fn test_time_reports_fault() {
        let (mut shell, config, registry) = setup();
        let result = registry
            .dispatch(&mut shell, &config, "time", "", Some("raise \"no\""))
            .unwrap();
        match result {
            Value::Str(report) => assert!(report.contains("faulted"), "{}", report),
            other => panic!("expected str, got {:?}", other),
        }
    }

    #[test]
    fn test_writefile_requires_effects() {
        let (mut shell, config, registry) = setup();
        let refused = registry.dispatch(&mut shell, &config, "writefile", "/tmp/x", Some("body"));
        assert!(matches!(refused, Err(SlateError::CommandRefused(_))));
    }

    #[test]
    fn test_writefile_writes_body() {
        let (mut shell, _, registry) = setup();
        let config = SessionConfig {
            allow_effects: true,
            ..SessionConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        let result = registry
            .dispatch(
                &mut shell,
                &config,
                "writefile",
                path.to_str().unwrap(),
                Some("hello\n"),
            )
            .unwrap();
        match result {
            Value::Str(message) => assert!(message.starts_with("wrote 6 bytes")),
            other => panic!("expected str, got {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_install_command_parses_upgrade_flag() {
        let (mut shell, config, registry) = setup();
        // Effects disabled: the report still carries the requested names.
        let result = registry
            .dispatch(&mut shell, &config, "install", "pkg==1.2.3 --upgrade", None)
            .unwrap();
        match result {
            Value::Map(record) => {
                assert_eq!(record.get("success"), Some(&Value::Bool(false)));
                assert_eq!(
                    record.get("requested_names"),
                    Some(&Value::List(vec![Value::Str("pkg".to_string())]))
                );
            }
            other => panic!("expected map, got {:?}", other),
        }
    }
}
