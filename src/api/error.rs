//! Ingress error taxonomy. Validation, duplicate-taskId and
//! unsupported-media failures are surfaced synchronously to the HTTP
//! client; Store/Queue failures become 500s.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use thiserror::Error;

use super::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("task {0} already exists")]
    DuplicateTaskId(String),

    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("task store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("task queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateTaskId(_) => StatusCode::CONFLICT,
            ApiError::UnsupportedMedia(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreUnavailable(_) | ApiError::QueueUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable numeric code carried in the error body.
    pub fn code(&self) -> u32 {
        match self {
            ApiError::Malformed(_) => 10001,
            ApiError::DuplicateTaskId(_) => 10002,
            ApiError::UnsupportedMedia(_) => 10003,
            ApiError::StoreUnavailable(_) => 10004,
            ApiError::QueueUnavailable(_) => 10005,
            ApiError::Internal(_) => 10006,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Malformed(err.to_string())
    }
}
