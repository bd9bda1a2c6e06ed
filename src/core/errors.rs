use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the ingestion and question-answering pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("File type not allowed: {0}")]
    UnsupportedFileType(String),

    #[error("failed to parse document: {0}")]
    ParseFailure(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{operation} failed: {message}")]
    DownstreamFailure { operation: String, message: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    DownstreamTimeout { operation: String, timeout_ms: u64 },
}

impl RagError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        RagError::Storage(err.to_string())
    }

    pub fn downstream<E: std::fmt::Display>(operation: &str, err: E) -> Self {
        RagError::DownstreamFailure {
            operation: operation.to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let message = err.to_string();
        match err {
            RagError::InvalidInput(_) | RagError::UnsupportedFileType(_) => {
                ApiError::BadRequest(message)
            }
            RagError::ParseFailure(_) => ApiError::Unprocessable(message),
            RagError::DownstreamFailure { .. } => ApiError::BadGateway(message),
            RagError::DownstreamTimeout { .. } => ApiError::GatewayTimeout(message),
            RagError::Storage(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
