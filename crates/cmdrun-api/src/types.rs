//! Request and response bodies of the HTTP API.
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/commands/start` and `POST /api/v1/commands/run`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub command: Option<String>,
    /// Whitespace-separated arguments.
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartCommandResponse {
    pub command_id: String,
}

/// Result of a synchronous run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandResponse {
    pub output: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandHelpResponse {
    pub name: String,
    pub help: String,
}
