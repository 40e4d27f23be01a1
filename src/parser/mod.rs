//! Parser module for the Slate fragment language

pub mod ast;
pub mod grammar;

pub use ast::*;
pub use grammar::{is_identifier, parse_program, KEYWORDS};
