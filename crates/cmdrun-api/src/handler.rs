use async_trait::async_trait;
use cmdrun_model::{JobId, OperationInfo, StatusRecord, StatusReply};

use crate::error::ApiError;

/// Command runner API handler.
///
/// This trait abstracts the backend implementation, allowing users to:
/// - Use the provided `JobServiceAdapter`
/// - Implement custom handlers with additional logic (auth, rate limiting, etc.)
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Start a command in the background; returns the id to poll.
    async fn start_command(&self, command: &str, arguments: &str) -> Result<JobId, ApiError>;

    /// Current status of a started command.
    async fn command_status(&self, id: &JobId) -> Result<StatusReply, ApiError>;

    /// Run a command and wait for its terminal record.
    async fn run_command(&self, command: &str, arguments: &str) -> Result<StatusRecord, ApiError>;

    /// Available commands with help texts.
    async fn list_commands(&self) -> Result<Vec<OperationInfo>, ApiError>;

    /// Help text of one command.
    async fn command_help(&self, name: &str) -> Result<String, ApiError>;
}
