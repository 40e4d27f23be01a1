//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slate")]
#[command(author, version, about = "A persistent, inspectable execution session for automated agents", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the durable session snapshot
    #[arg(long, global = true, env = "SLATE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Package installer program used by the install command
    #[arg(long, global = true, env = "SLATE_INSTALLER")]
    pub installer: Option<String>,

    /// Allow effectful commands (install, writefile)
    #[arg(long, global = true)]
    pub allow_effects: bool,

    /// Skip restoring the previous session snapshot on startup
    #[arg(long, global = true)]
    pub no_restore: bool,

    /// Skip saving the session snapshot on exit
    #[arg(long, global = true)]
    pub no_save: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Execute a single fragment
    Exec {
        /// The fragment to execute
        fragment: String,
    },

    /// Run a Slate script file (.slate)
    Run {
        /// Path to the .slate script file
        file: PathBuf,
    },

    /// Start interactive REPL mode
    Repl,

    /// List user bindings
    Names {
        /// Case-insensitive substring filter
        filter: Option<String>,
    },

    /// Inspect a binding
    Inspect {
        /// Name of the binding to inspect
        name: String,

        /// Detail level: 0 type+rendering, 1 adds doc, 2 adds source
        #[arg(long, short, default_value = "0")]
        detail: u8,
    },

    /// Complete the identifier ending at the cursor
    Complete {
        /// The text to complete
        text: String,

        /// Cursor position (defaults to the end of the text)
        #[arg(long)]
        cursor: Option<usize>,
    },

    /// Show the signature of a callable binding
    Signature {
        /// Name of the callable
        name: String,
    },

    /// List attributes of a binding, partitioned by capability
    Attrs {
        /// Name of the binding
        name: String,

        /// Case-insensitive glob over attribute names
        #[arg(long, default_value = "*")]
        pattern: String,

        /// Include attributes starting with an underscore
        #[arg(long)]
        include_private: bool,
    },

    /// Report the most recent runtime fault
    LastFault,

    /// List extension commands
    Commands,
}
