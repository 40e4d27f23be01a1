//! Dependency installation
//!
//! Runs the configured package installer as a child process and reports the
//! outcome as data. Failures are never propagated: a nonzero exit, a
//! missing installer binary or a permission problem all come back as
//! `{success: false}` with a best-effort message.

use std::collections::BTreeMap;
use std::process::Command;

use crate::engine::SessionConfig;
use crate::runtime::Value;

/// Result of one installation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    pub success: bool,
    pub output: String,
    /// Bare package names, version constraints and source markers stripped.
    pub requested_names: Vec<String>,
}

impl InstallReport {
    fn failure(output: String, requested_names: Vec<String>) -> Self {
        Self {
            success: false,
            output,
            requested_names,
        }
    }

    /// For callers that prefer `Result`-style handling over inspecting the
    /// report: a failed report becomes a typed `InstallFailure`.
    pub fn into_result(self) -> crate::error::Result<InstallReport> {
        if self.success {
            Ok(self)
        } else {
            Err(crate::error::SlateError::InstallFailure(self.output))
        }
    }

    pub fn to_value(&self) -> Value {
        let mut record = BTreeMap::new();
        record.insert("success".to_string(), Value::Bool(self.success));
        record.insert("output".to_string(), Value::Str(self.output.clone()));
        record.insert(
            "requested_names".to_string(),
            Value::List(
                self.requested_names
                    .iter()
                    .map(|n| Value::Str(n.clone()))
                    .collect(),
            ),
        );
        Value::Map(record)
    }
}

/// Bare names requested by a specification: whitespace-split, with version
/// constraints (`==`, `>=`, `<=`, `>`, `<`, `@`) stripped; git sources
/// reduce to the repository name.
pub fn requested_names(spec: &str) -> Vec<String> {
    let mut names = Vec::new();
    for pkg in spec.split_whitespace() {
        let mut base = pkg;
        for marker in ["==", ">=", "<=", ">", "<", "@"] {
            base = base.split(marker).next().unwrap_or(base);
        }
        if let Some(rest) = base.strip_prefix("git+") {
            let repo = rest
                .rsplit('/')
                .next()
                .unwrap_or(rest)
                .trim_end_matches(".git");
            if !repo.is_empty() {
                names.push(repo.to_string());
            }
        } else if !base.is_empty() {
            names.push(base.to_string());
        }
    }
    names
}

/// Run the installer: `<installer> install [--upgrade] <spec...>`.
pub fn run_install(config: &SessionConfig, spec: &str, upgrade: bool) -> InstallReport {
    let requested = requested_names(spec);

    if spec.trim().is_empty() {
        return InstallReport::failure("no package specification given".to_string(), requested);
    }
    if !config.allow_effects {
        return InstallReport::failure(
            "effectful commands are disabled; start the session with --allow-effects".to_string(),
            requested,
        );
    }

    let mut command = Command::new(&config.installer);
    command.arg("install");
    if upgrade {
        command.arg("--upgrade");
    }
    for part in spec.split_whitespace() {
        command.arg(part);
    }

    log::info!("installing '{}' via '{}'", spec, config.installer);
    match command.output() {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
            let err_text = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            if !err_text.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&err_text);
            }

            if output.status.success() {
                InstallReport {
                    success: true,
                    output: if text.is_empty() {
                        "package installation completed".to_string()
                    } else {
                        text
                    },
                    requested_names: requested,
                }
            } else {
                log::warn!("installer exited with {}", output.status);
                InstallReport::failure(
                    format!("installation failed: {}", enrich_message(&text)),
                    requested,
                )
            }
        }
        Err(error) => {
            let message = match error.kind() {
                std::io::ErrorKind::NotFound => format!(
                    "installer '{}' not found on PATH",
                    config.installer
                ),
                std::io::ErrorKind::PermissionDenied => format!(
                    "permission denied running installer '{}'",
                    config.installer
                ),
                _ => error.to_string(),
            };
            log::warn!("install spawn failed: {}", message);
            InstallReport::failure(format!("installation failed: {}", message), requested)
        }
    }
}

fn enrich_message(text: &str) -> String {
    let mut message = if text.is_empty() {
        "installer exited with a nonzero status".to_string()
    } else {
        text.to_string()
    };
    if text.contains("No module named") {
        message.push_str(
            "\nNote: the package may be published under a different name or source.",
        );
    } else if text.contains("Permission denied") {
        message.push_str("\nNote: installation may need different permissions here.");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effectful_config(installer: &str) -> SessionConfig {
        SessionConfig {
            installer: installer.to_string(),
            allow_effects: true,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_requested_names_strips_constraints() {
        for spec in [
            "pkg==1.2.3",
            "pkg>=1.0",
            "pkg<=2.0",
            "pkg>1",
            "pkg<2",
            "pkg@source",
        ] {
            assert_eq!(requested_names(spec), vec!["pkg".to_string()], "{}", spec);
        }
    }

    #[test]
    fn test_requested_names_multiple_and_git() {
        assert_eq!(
            requested_names("alpha beta==2.0 git+https://example.com/user/repo.git@main"),
            vec!["alpha".to_string(), "beta".to_string(), "repo".to_string()]
        );
    }

    #[test]
    fn test_install_refused_without_effects() {
        let config = SessionConfig::default();
        let report = run_install(&config, "pkg==1.2.3", false);
        assert!(!report.success);
        assert_eq!(report.requested_names, vec!["pkg".to_string()]);
        assert!(report.output.contains("disabled"));
    }

    #[test]
    fn test_install_with_stub_installer_succeeds() {
        let report = run_install(&effectful_config("true"), "pkg", false);
        assert!(report.success, "output: {}", report.output);
        assert_eq!(report.requested_names, vec!["pkg".to_string()]);
    }

    #[test]
    fn test_install_nonzero_exit_is_failure() {
        let report = run_install(&effectful_config("false"), "pkg", true);
        assert!(!report.success);
        assert!(report.output.contains("installation failed"));
    }

    #[test]
    fn test_install_missing_binary_is_failure() {
        let report = run_install(
            &effectful_config("slate-test-no-such-installer"),
            "pkg>=1.0",
            false,
        );
        assert!(!report.success);
        assert!(report.output.contains("not found"));
        assert_eq!(report.requested_names, vec!["pkg".to_string()]);
    }

    #[test]
    fn test_empty_spec_is_failure() {
        let report = run_install(&effectful_config("true"), "   ", false);
        assert!(!report.success);
        assert!(report.requested_names.is_empty());
    }

    #[test]
    fn test_failed_report_into_result() {
        let config = SessionConfig::default();
        let result = run_install(&config, "pkg", false).into_result();
        assert!(matches!(
            result,
            Err(crate::error::SlateError::InstallFailure(_))
        ));
    }

    #[test]
    fn test_report_to_value() {
        let report = InstallReport {
            success: true,
            output: "done".to_string(),
            requested_names: vec!["pkg".to_string()],
        };
        match report.to_value() {
            Value::Map(record) => {
                assert_eq!(record.get("success"), Some(&Value::Bool(true)));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }
}
