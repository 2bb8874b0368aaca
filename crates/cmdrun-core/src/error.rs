use cmdrun_model::ModelError;
use thiserror::Error;

/// Failures of the shared cache and of the status store built on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("value for '{key}' is too large: {size} bytes (limit {limit})")]
    TooLarge {
        key: String,
        size: usize,
        limit: usize,
    },
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache lock poisoned")]
    Poisoned,
    #[error("io error: {0}")]
    Io(String),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("failed to decode record: {0}")]
    Decode(String),
}

impl StoreError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::TooLarge { .. } => "too_large",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Poisoned => "poisoned",
            StoreError::Io(_) => "io",
            StoreError::Encode(_) => "encode",
            StoreError::Decode(_) => "decode",
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Failure raised by an operation while it runs.
///
/// The display text is what ends up in the `error` field of the terminal record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("handoff to worker failed: {0}")]
    Handoff(String),
    #[error("executor misconfigured: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ModelError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("operation already registered: {0}")]
    DuplicateOperation(String),
}
