//! CLI argument definitions

pub mod args;

pub use args::{Args, SubCommand};
