//! Slate - a persistent, inspectable execution session for automated agents
//!
//! Slate keeps one shared namespace alive across code submissions: an
//! external caller executes fragments against it, inspects the resulting
//! bindings without running code, and the whole session survives process
//! restarts through durable snapshots.
//!
//! # Example
//!
//! ```no_run
//! use slate::{Session, SessionConfig, Value};
//!
//! let session = Session::new(SessionConfig::default());
//! session.restore();
//! session.execute("x = 20");
//! let outcome = session.execute("x * 2 + 2");
//! assert_eq!(outcome.result, Some(Value::Int(42)));
//! session.save();
//! ```

pub mod bridge;
pub mod cli;
pub mod commands;
pub mod engine;
pub mod error;
pub mod introspect;
pub mod namespace;
pub mod output;
pub mod parser;
pub mod persist;
pub mod runtime;
pub mod script;

#[cfg(feature = "repl")]
pub mod repl;

pub use bridge::ToolBridge;
pub use commands::{CommandHelp, CommandListing, InstallReport};
pub use engine::{ExecutionOutcome, Session, SessionConfig};
pub use error::{Result, SlateError};
pub use introspect::{
    AttributesReply, CompletionReply, FaultReply, InspectReply, SignatureReply,
};
pub use namespace::NamespaceStore;
pub use output::{format_outcome, OutputFormat};
pub use parser::{parse_program, Program};
pub use persist::PersistenceManager;
pub use runtime::{Fault, NativeFn, Value};
pub use script::{validate_script, ScriptRunner, ValidationOptions};
