use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{format::LoggerFormat, level::LoggerLevel};

/// Stream the text and json formats write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerOutput {
    #[default]
    Stdout,
    /// Worker processes keep stdout free.
    Stderr,
}

impl LoggerOutput {
    fn is_terminal(&self) -> bool {
        match self {
            LoggerOutput::Stdout => std::io::stdout().is_terminal(),
            LoggerOutput::Stderr => std::io::stderr().is_terminal(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: LoggerLevel,
    pub output: LoggerOutput,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::for_output(LoggerOutput::Stdout)
    }
}

impl LoggerConfig {
    /// Defaults for `output`; colors only when it is a terminal.
    pub fn for_output(output: LoggerOutput) -> Self {
        Self {
            format: LoggerFormat::Text,
            level: LoggerLevel::default(),
            output,
            with_targets: true,
            use_color: cfg!(test) || output.is_terminal(),
        }
    }
}
