//! Script validation
//!
//! Validates scripts before execution: parse problems are errors, commands
//! that will be refused under the current configuration are warnings.

use crate::commands::CommandRegistry;
use crate::parser::parse_program;
use crate::script::runner::{split_segments, Segment};

/// Errors that can occur during script validation
#[derive(Debug, Clone)]
pub struct ScriptValidationError {
    pub line: Option<usize>,
    pub message: String,
    pub severity: ValidationSeverity,
}

/// Severity level for validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ScriptValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            ValidationSeverity::Error => "ERROR",
            ValidationSeverity::Warning => "WARNING",
        };
        if let Some(line) = self.line {
            write!(f, "{} (line {}): {}", prefix, line, self.message)
        } else {
            write!(f, "{}: {}", prefix, self.message)
        }
    }
}

/// Validation options
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Whether effectful commands are enabled for this run
    pub allow_effects: bool,
}

/// Commands with externally visible side effects.
const EFFECTFUL_COMMANDS: &[&str] = &["install", "writefile"];

/// Validate script source without executing it.
pub fn validate_script(source: &str, options: &ValidationOptions) -> Vec<ScriptValidationError> {
    let registry = CommandRegistry::builtin();
    let listing = registry.listing();
    let mut errors = Vec::new();

    for segment in split_segments(source) {
        match segment {
            Segment::Fragment { code, line } => {
                if let Err(error) = parse_program(&code) {
                    errors.push(ScriptValidationError {
                        line: Some(line),
                        message: error.to_string(),
                        severity: ValidationSeverity::Error,
                    });
                }
            }
            Segment::LineCommand { name, line, .. } => {
                check_command(&mut errors, &listing.line_forms, &name, line, options, "line");
            }
            Segment::BlockCommand { name, line, .. } => {
                check_command(
                    &mut errors,
                    &listing.block_forms,
                    &name,
                    line,
                    options,
                    "block",
                );
            }
        }
    }
    errors
}

fn check_command(
    errors: &mut Vec<ScriptValidationError>,
    known: &[String],
    name: &str,
    line: usize,
    options: &ValidationOptions,
    form: &str,
) {
    if !known.iter().any(|k| k == name) {
        errors.push(ScriptValidationError {
            line: Some(line),
            message: format!("unknown {} command '{}'", form, name),
            severity: ValidationSeverity::Warning,
        });
        return;
    }
    if EFFECTFUL_COMMANDS.contains(&name) && !options.allow_effects {
        errors.push(ScriptValidationError {
            line: Some(line),
            message: format!(
                "command '{}' will be refused without --allow-effects",
                name
            ),
            severity: ValidationSeverity::Warning,
        });
    }
}

/// Check if validation found any hard errors
pub fn has_errors(errors: &[ScriptValidationError]) -> bool {
    errors
        .iter()
        .any(|e| e.severity == ValidationSeverity::Error)
}
