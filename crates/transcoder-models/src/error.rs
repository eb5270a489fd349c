//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Executable path is empty")]
    EmptyExecutable,

    #[error("Remote transport is missing its {0}")]
    IncompleteTransport(&'static str),

    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}
