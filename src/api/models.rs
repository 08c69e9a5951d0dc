use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::PatientInfo;

/// `POST /api/v1/analyze` JSON body. The multipart variant
/// carries the same fields but with `image` as an uploaded file instead of
/// `imageUrl`; see [`super::validation`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeJsonRequest {
    pub task_id: String,
    pub task_type: String,
    pub image_url: String,
    pub callback_url: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub patient_info: Option<PatientInfo>,
}

/// The multipart form fields parsed ahead of the `image` part itself.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeMultipartFields {
    pub task_id: Option<String>,
    pub task_type: Option<String>,
    pub callback_url: Option<String>,
    pub metadata: Option<Value>,
    pub patient_info: Option<PatientInfo>,
}

/// 202 response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub task_id: String,
    pub status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: time::OffsetDateTime,
    pub metadata: Value,
}

/// Liveness payload for `/health` and `/api/v1/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error body for every non-2xx response from `POST /api/v1/analyze`:
/// `code` is the stable numeric taxonomy value, `message`
/// is engineer-facing detail.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
}
