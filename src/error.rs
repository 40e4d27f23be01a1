//! Error types for Slate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlateError {
    #[error("Parse fault: {0}")]
    ParseFault(String),

    #[error("Runtime fault: {0}")]
    RuntimeFault(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Install failure: {0}")]
    InstallFailure(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Command refused: {0}")]
    CommandRefused(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SlateError>;
