//! Script runner for executing .slate files
//!
//! A script mixes plain fragments with `%command` lines and `%%command`
//! blocks (a block body runs to the first blank line). Segments execute in
//! order against one session; the first fault stops the run.

use std::fs;
use std::path::Path;

use crate::engine::Session;
use crate::error::{Result, SlateError};
use crate::output::{format_outcome, OutputFormat};
use crate::runtime::Value;

/// One executable unit of a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Fragment {
        code: String,
        line: usize,
    },
    LineCommand {
        name: String,
        args: String,
        line: usize,
    },
    BlockCommand {
        name: String,
        args: String,
        body: String,
        line: usize,
    },
}

/// Split a script into fragments and command segments.
pub fn split_segments(source: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_start = 1;

    let lines: Vec<&str> = source.lines().collect();
    let mut i = 0;

    let flush = |segments: &mut Vec<Segment>, buffer: &mut Vec<&str>, start: usize| {
        let code = buffer.join("\n");
        if !code.trim().is_empty() {
            segments.push(Segment::Fragment { code, line: start });
        }
        buffer.clear();
    };

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();

        if let Some(rest) = trimmed.strip_prefix("%%") {
            flush(&mut segments, &mut buffer, buffer_start);
            let magic_line = i + 1;
            let (name, args) = split_command_line(rest);
            let mut body_lines = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim().is_empty() {
                body_lines.push(lines[i]);
                i += 1;
            }
            segments.push(Segment::BlockCommand {
                name,
                args,
                body: body_lines.join("\n"),
                line: magic_line,
            });
            buffer_start = i + 2;
        } else if let Some(rest) = trimmed.strip_prefix('%') {
            flush(&mut segments, &mut buffer, buffer_start);
            let (name, args) = split_command_line(rest);
            segments.push(Segment::LineCommand {
                name,
                args,
                line: i + 1,
            });
            buffer_start = i + 2;
        } else {
            if buffer.is_empty() {
                buffer_start = i + 1;
            }
            buffer.push(line);
        }
        i += 1;
    }
    flush(&mut segments, &mut buffer, buffer_start);

    segments
}

fn split_command_line(rest: &str) -> (String, String) {
    let rest = rest.trim();
    match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name.to_string(), args.trim().to_string()),
        None => (rest.to_string(), String::new()),
    }
}

/// Result of script execution
#[derive(Debug)]
pub struct ScriptResult {
    pub segments_executed: usize,
    pub success: bool,
    pub error: Option<String>,
}

/// Script runner that executes segments against a session
pub struct ScriptRunner<'a> {
    session: &'a Session,
    format: OutputFormat,
    verbose: bool,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(session: &'a Session, format: OutputFormat, verbose: bool) -> Self {
        Self {
            session,
            format,
            verbose,
        }
    }

    /// Load and run a script file
    pub fn run_file(&self, path: &Path) -> Result<ScriptResult> {
        if path.extension().is_none_or(|e| e != "slate") {
            return Err(SlateError::RuntimeFault(format!(
                "script file must have .slate extension: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Ok(self.run_source(&content))
    }

    /// Run script source, stopping at the first fault.
    pub fn run_source(&self, source: &str) -> ScriptResult {
        let mut executed = 0;

        for segment in split_segments(source) {
            match segment {
                Segment::Fragment { code, line } => {
                    let outcome = self.session.execute(&code);
                    let text = format_outcome(&outcome, &self.format);
                    if !text.is_empty() {
                        println!("{}", text);
                    }
                    if !outcome.ok() {
                        let fault = outcome
                            .fault_before_run
                            .or(outcome.fault_during_run)
                            .map(|f| f.to_string())
                            .unwrap_or_default();
                        return ScriptResult {
                            segments_executed: executed,
                            success: false,
                            error: Some(format!("line {}: {}", line, fault)),
                        };
                    }
                    executed += 1;
                }
                Segment::LineCommand { name, args, line } => {
                    match self.session.run_command(&name, &args, None) {
                        Ok(value) => {
                            self.print_command_result(&value);
                            executed += 1;
                        }
                        Err(error) => {
                            return ScriptResult {
                                segments_executed: executed,
                                success: false,
                                error: Some(format!("line {}: {}", line, error)),
                            }
                        }
                    }
                }
                Segment::BlockCommand {
                    name,
                    args,
                    body,
                    line,
                } => match self.session.run_command(&name, &args, Some(&body)) {
                    Ok(value) => {
                        self.print_command_result(&value);
                        executed += 1;
                    }
                    Err(error) => {
                        return ScriptResult {
                            segments_executed: executed,
                            success: false,
                            error: Some(format!("line {}: {}", line, error)),
                        }
                    }
                },
            }
        }

        ScriptResult {
            segments_executed: executed,
            success: true,
            error: None,
        }
    }

    fn print_command_result(&self, value: &Value) {
        match value {
            Value::Null => {}
            Value::Str(s) if s.is_empty() => {}
            Value::Str(s) => println!("{}", s),
            other => {
                if self.verbose {
                    println!("{}", other.render());
                }
            }
        }
    }
}
