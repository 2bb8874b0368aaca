use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("command name is empty")]
    EmptyCommandName,
    #[error("command name contains whitespace: '{0}'")]
    InvalidCommandName(String),
}
