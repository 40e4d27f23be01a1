//! Script execution for .slate files

pub mod runner;
pub mod validator;

pub use runner::{split_segments, ScriptResult, ScriptRunner, Segment};
pub use validator::{
    has_errors, validate_script, ScriptValidationError, ValidationOptions, ValidationSeverity,
};
