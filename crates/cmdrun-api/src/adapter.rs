use std::sync::Arc;

use async_trait::async_trait;
use cmdrun_core::JobService;
use cmdrun_model::{JobId, OperationInfo, StatusRecord, StatusReply};

use crate::error::ApiError;
use crate::handler::ApiHandler;

/// Adapter that bridges `JobService` to `ApiHandler`.
///
/// This is a ready-to-use implementation that directly delegates to `JobService`.
pub struct JobServiceAdapter {
    service: Arc<JobService>,
}

impl JobServiceAdapter {
    pub fn new(service: Arc<JobService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ApiHandler for JobServiceAdapter {
    async fn start_command(&self, command: &str, arguments: &str) -> Result<JobId, ApiError> {
        self.service
            .start(command, arguments)
            .await
            .map_err(ApiError::from)
    }

    async fn command_status(&self, id: &JobId) -> Result<StatusReply, ApiError> {
        self.service.status(id).map_err(ApiError::from)
    }

    async fn run_command(&self, command: &str, arguments: &str) -> Result<StatusRecord, ApiError> {
        self.service
            .run_inline(command, arguments)
            .await
            .map_err(ApiError::from)
    }

    async fn list_commands(&self) -> Result<Vec<OperationInfo>, ApiError> {
        Ok(self.service.list_operations())
    }

    async fn command_help(&self, name: &str) -> Result<String, ApiError> {
        self.service
            .describe(name)
            .ok_or_else(|| ApiError::CommandNotFound(name.to_string()))
    }
}
