//! Extension command dispatcher
//!
//! Named meta commands, distinct from plain fragments, in two forms: line
//! commands take a single argument line, block commands additionally take a
//! body. Discovery (`listing`, `describe`) is advisory and never fails;
//! dispatch of an unknown name is a typed `NotFound`.

pub mod builtins;
pub mod install;

use std::collections::BTreeMap;

use crate::engine::{SessionConfig, Shell};
use crate::error::{Result, SlateError};
use crate::runtime::Value;

pub use install::{requested_names, run_install, InstallReport};

type LineHandler = fn(&mut Shell, &SessionConfig, &str) -> Result<Value>;
type BlockHandler = fn(&mut Shell, &SessionConfig, &str, &str) -> Result<Value>;

#[derive(Debug, Clone)]
pub struct CommandInfo {
    pub name: &'static str,
    pub summary: &'static str,
    pub help: &'static str,
}

struct LineCommand {
    info: CommandInfo,
    run: LineHandler,
}

struct BlockCommand {
    info: CommandInfo,
    run: BlockHandler,
}

/// Command names, partitioned by form.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandListing {
    pub line_forms: Vec<String>,
    pub block_forms: Vec<String>,
}

/// Help payload for one command. `exists: false` rather than an error for
/// unknown names, mirroring the introspection service's advisory policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandHelp {
    pub exists: bool,
    pub summary: String,
    pub help_text: String,
}

pub struct CommandRegistry {
    line: BTreeMap<&'static str, LineCommand>,
    block: BTreeMap<&'static str, BlockCommand>,
}

impl CommandRegistry {
    /// The built-in command set.
    pub fn builtin() -> Self {
        let mut registry = Self {
            line: BTreeMap::new(),
            block: BTreeMap::new(),
        };

        registry.register_line(
            CommandInfo {
                name: "install",
                summary: "Install a dependency with the configured installer",
                help: "install <spec...> [--upgrade]\n\n\
                       Runs the configured package installer against the given\n\
                       specification. Version constraints (==, >=, <=, >, <, @)\n\
                       are allowed; multiple packages may be space separated.\n\
                       Requires the session to allow effectful commands.",
            },
            builtins::cmd_install,
        );
        registry.register_line(
            CommandInfo {
                name: "who",
                summary: "List user bindings",
                help: "who [filter]\n\nSpace-separated user bindings, optionally\n\
                       filtered by a case-insensitive substring.",
            },
            builtins::cmd_who,
        );
        registry.register_line(
            CommandInfo {
                name: "history",
                summary: "Show the input history",
                help: "history [N | N-M]\n\nShow accepted fragments, numbered from 1.\n\
                       With no range, the whole session history is shown.",
            },
            builtins::cmd_history,
        );
        registry.register_line(
            CommandInfo {
                name: "reset",
                summary: "Clear all user bindings",
                help: "reset\n\nClears the namespace and reseeds the reserved\n\
                       machinery. Input history and fragment numbering are kept.",
            },
            builtins::cmd_reset,
        );

        registry.register_block(
            CommandInfo {
                name: "time",
                summary: "Time the execution of a fragment",
                help: "time (block form)\n\nExecutes the body as a fragment and\n\
                       reports the wall-clock duration. The body's bindings land\n\
                       in the namespace exactly as with execute.",
            },
            builtins::cmd_time,
        );
        registry.register_block(
            CommandInfo {
                name: "writefile",
                summary: "Write the block body to a file",
                help: "writefile <path> (block form)\n\nWrites the body verbatim to\n\
                       the given path. Requires the session to allow effectful\n\
                       commands.",
            },
            builtins::cmd_writefile,
        );

        registry
    }

    fn register_line(&mut self, info: CommandInfo, run: LineHandler) {
        self.line.insert(info.name, LineCommand { info, run });
    }

    fn register_block(&mut self, info: CommandInfo, run: BlockHandler) {
        self.block.insert(info.name, BlockCommand { info, run });
    }

    /// Dispatch by name. A present, non-empty body selects the block form;
    /// otherwise the line form runs with the argument line alone.
    pub fn dispatch(
        &self,
        shell: &mut Shell,
        config: &SessionConfig,
        name: &str,
        line_args: &str,
        block_body: Option<&str>,
    ) -> Result<Value> {
        let body = block_body.filter(|b| !b.trim().is_empty());
        match body {
            Some(body) => {
                let command = self.block.get(name).ok_or_else(|| {
                    SlateError::NotFound(format!("no block command named '{}'", name))
                })?;
                (command.run)(shell, config, line_args, body)
            }
            None => {
                let command = self.line.get(name).ok_or_else(|| {
                    SlateError::NotFound(format!("no line command named '{}'", name))
                })?;
                (command.run)(shell, config, line_args)
            }
        }
    }

    pub fn listing(&self) -> CommandListing {
        CommandListing {
            line_forms: self.line.keys().map(|k| k.to_string()).collect(),
            block_forms: self.block.keys().map(|k| k.to_string()).collect(),
        }
    }

    pub fn describe(&self, name: &str, block_form: bool) -> CommandHelp {
        let info = if block_form {
            self.block.get(name).map(|c| &c.info)
        } else {
            self.line.get(name).map(|c| &c.info)
        };

        match info {
            Some(info) => CommandHelp {
                exists: true,
                summary: info.summary.to_string(),
                help_text: info.help.to_string(),
            },
            None => CommandHelp {
                exists: false,
                summary: String::new(),
                help_text: String::new(),
            },
        }
    }
}
