//! Output formatting for outcomes and introspection replies

pub mod formatter;
pub mod human;
pub mod json;

pub use formatter::{format_outcome, OutputFormat};
pub use human::format_human;
pub use json::{format_json, outcome_to_json, value_to_json};
