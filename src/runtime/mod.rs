//! Runtime value model shared by the engine, introspection and persistence

pub mod fault;
pub mod value;

pub use fault::Fault;
pub use value::{FuncValue, NativeFn, Value};
