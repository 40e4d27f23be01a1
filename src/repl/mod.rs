//! Interactive REPL (enabled with the `repl` feature)

pub mod interactive;

pub use interactive::run_repl;
