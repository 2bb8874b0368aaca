use cmdrun_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::{Json, http::StatusCode};

        let status = match &self {
            ApiError::InvalidRequest(_) | ApiError::Core(CoreError::InvalidRequest(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::CommandNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(target: "cmdrun.api", error = %self, %status, "request failed");
        } else {
            tracing::debug!(target: "cmdrun.api", error = %self, %status, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
