//! Core data model shared by the store, queue, dispatcher and callback
//! dispatcher: the Task Record and the Callback Envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Selects which inference pipeline a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Panoramic,
    Cephalometric,
    DentalAge,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Panoramic => "panoramic",
            TaskType::Cephalometric => "cephalometric",
            TaskType::DentalAge => "dental_age",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "panoramic" => Some(TaskType::Panoramic),
            "cephalometric" => Some(TaskType::Cephalometric),
            "dental_age" => Some(TaskType::DentalAge),
            _ => None,
        }
    }
}

/// Gender enum for `patientInfo.gender` on cephalometric tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Male" => Some(Gender::Male),
            "Female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// Dental age stage enum for `patientInfo.DentalAgeStage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DentalAgeStage {
    Permanent,
    Mixed,
}

impl DentalAgeStage {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Permanent" => Some(DentalAgeStage::Permanent),
            "Mixed" => Some(DentalAgeStage::Mixed),
            _ => None,
        }
    }
}

/// Patient metadata required for cephalometric tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientInfo {
    pub gender: Gender,
    #[serde(rename = "DentalAgeStage")]
    pub dental_age_stage: DentalAgeStage,
    #[serde(default, rename = "pixelSpacing")]
    pub pixel_spacing: Option<f64>,
}

/// Where the task's image bytes live: already on local disk (multipart
/// upload) or still need fetching from a remote URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImageRef {
    LocalPath(String),
    RemoteUrl(String),
}

impl ImageRef {
    /// The `imageUrl` to echo back in `requestParameters`; local
    /// uploads have no URL, so this is empty.
    pub fn display_url(&self) -> String {
        match self {
            ImageRef::LocalPath(_) => String::new(),
            ImageRef::RemoteUrl(url) => url.clone(),
        }
    }
}

/// The unit of work persisted in the Task Store. Created at
/// admission, destroyed at successful callback, reaped at TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub task_type: TaskType,
    pub image_ref: ImageRef,
    pub callback_url: String,
    #[serde(default)]
    pub metadata: Value,
    pub patient_info: Option<PatientInfo>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub ttl_sec: u64,
}

impl TaskRecord {
    pub fn expires_at(&self) -> OffsetDateTime {
        self.created_at + time::Duration::seconds(self.ttl_sec as i64)
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at()
    }
}

/// Terminal status carried by the callback envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
}

/// The `requestParameters` block echoed in the callback envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    pub task_type: String,
    pub image_url: String,
}

/// Structured error detail carried in a FAILURE envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: u32,
    pub message: String,
    pub display_message: String,
}

/// The callback envelope POSTed to `callbackUrl`. Exactly one of
/// `data` / `error` is populated, agreeing with `status`.
#[derive(Debug, Clone, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct CallbackEnvelope {
    pub task_id: String,
    pub status: CallbackStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub metadata: Value,
    pub request_parameters: RequestParameters,
    #[builder(default)]
    pub data: Option<Value>,
    #[builder(default)]
    pub error: Option<ErrorDetail>,
}

impl CallbackEnvelope {
    pub fn success(task_id: String, metadata: Value, params: RequestParameters, data: Value) -> Self {
        CallbackEnvelope::builder()
            .task_id(task_id)
            .status(CallbackStatus::Success)
            .timestamp(OffsetDateTime::now_utc())
            .metadata(metadata)
            .request_parameters(params)
            .data(data)
            .build()
    }

    pub fn failure(
        task_id: String,
        metadata: Value,
        params: RequestParameters,
        error: ErrorDetail,
    ) -> Self {
        CallbackEnvelope::builder()
            .task_id(task_id)
            .status(CallbackStatus::Failure)
            .timestamp(OffsetDateTime::now_utc())
            .metadata(metadata)
            .request_parameters(params)
            .error(error)
            .build()
    }
}

/// Error taxonomy — kinds, not Rust error types. Each worker-side
/// kind maps to a stable numeric code carried in the callback envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ImageUnreachable,
    ImageTooLarge,
    ImageFormatBad,
    InferenceFailure,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            ErrorKind::ImageUnreachable => 20001,
            ErrorKind::ImageTooLarge => 20002,
            ErrorKind::ImageFormatBad => 20003,
            ErrorKind::InferenceFailure => 20004,
        }
    }

    pub fn display_message(&self) -> &'static str {
        match self {
            ErrorKind::ImageUnreachable => "We couldn't download the submitted image.",
            ErrorKind::ImageTooLarge => "The submitted image exceeds the allowed size.",
            ErrorKind::ImageFormatBad => "The submitted image format is not supported.",
            ErrorKind::InferenceFailure => "Analysis failed for the submitted image.",
        }
    }

    pub fn to_error_detail(&self, message: impl Into<String>) -> ErrorDetail {
        ErrorDetail {
            code: self.code(),
            message: message.into(),
            display_message: self.display_message().to_string(),
        }
    }
}
