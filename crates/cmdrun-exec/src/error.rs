use cmdrun_core::{ExecutorError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("missing program")]
    MissingProgram,
    #[error("invalid process config: {0}")]
    Config(String),
    #[error("worker handoff failed: {0}")]
    Handoff(String),
    #[error("invalid worker request: {0}")]
    Decode(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for ExecutorError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Spawn(_) | ExecError::MissingProgram => ExecutorError::Spawn(e.to_string()),
            ExecError::Config(_) | ExecError::Store(_) => ExecutorError::Config(e.to_string()),
            ExecError::Handoff(_) | ExecError::Decode(_) | ExecError::Io(_) => {
                ExecutorError::Handoff(e.to_string())
            }
        }
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
