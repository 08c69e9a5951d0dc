//! Ingress handlers: `POST /api/v1/analyze` accepts either a
//! JSON body or a multipart upload, validates it, admits it through the
//! Store/Queue, and returns 202 without ever waiting on inference.

use std::path::PathBuf;

use axum::extract::{Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::api::models::{
    AnalyzeJsonRequest, AnalyzeMultipartFields, AnalyzeResponse, HealthResponse,
};
use crate::api::state::AppState;
use crate::api::validation;
use crate::domain::{ImageRef, TaskRecord};
use crate::store::CreateOutcome;

/// `POST /api/v1/analyze`. Branches on `Content-Type`: `multipart/form-data`
/// carries a pre-uploaded file, `application/json` carries an `imageUrl`
/// to fetch later. Anything else is `UnsupportedMedia`.
pub async fn analyze(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|err| ApiError::Malformed(err.to_string()))?;
        handle_multipart(state, multipart).await
    } else if content_type.starts_with("application/json") {
        let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .map_err(|err| ApiError::Malformed(err.to_string()))?;
        let payload: AnalyzeJsonRequest = serde_json::from_slice(&bytes)?;
        handle_json(state, payload).await
    } else {
        Err(ApiError::UnsupportedMedia(format!(
            "Content-Type '{content_type}' is not application/json or multipart/form-data"
        )))
    }
}

async fn handle_json(
    state: AppState,
    payload: AnalyzeJsonRequest,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    validation::validate_task_id(&payload.task_id)?;
    let task_type = validation::validate_task_type(&payload.task_type)?;
    validation::validate_callback_url(&payload.callback_url)?;
    validation::validate_patient_info(task_type, &payload.patient_info)?;
    if payload.image_url.trim().is_empty() {
        return Err(ApiError::Malformed("imageUrl is required".into()));
    }
    validation::validate_image_url(&payload.image_url)?;

    let metadata = payload.metadata.unwrap_or_else(|| json!({}));
    let record = TaskRecord {
        task_id: payload.task_id,
        task_type,
        image_ref: ImageRef::RemoteUrl(payload.image_url),
        callback_url: payload.callback_url,
        metadata: metadata.clone(),
        patient_info: payload.patient_info,
        created_at: OffsetDateTime::now_utc(),
        ttl_sec: state.config.store.ttl_sec,
    };

    admit(&state, record, metadata).await
}

async fn handle_multipart(
    state: AppState,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    let mut fields = AnalyzeMultipartFields::default();
    let mut image_bytes: Option<Bytes> = None;
    let mut image_filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Malformed(err.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "taskId" => fields.task_id = Some(field_text(field).await?),
            "taskType" => fields.task_type = Some(field_text(field).await?),
            "callbackUrl" => fields.callback_url = Some(field_text(field).await?),
            "metadata" => {
                let raw = field_text(field).await?;
                fields.metadata = Some(serde_json::from_str(&raw)?);
            }
            "patientInfo" => {
                let raw = field_text(field).await?;
                fields.patient_info = Some(serde_json::from_str(&raw)?);
            }
            "image" => {
                image_filename = field.file_name().map(str::to_string);
                image_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|err| ApiError::Malformed(err.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let task_id = fields
        .task_id
        .ok_or_else(|| ApiError::Malformed("taskId is required".into()))?;
    let task_type_raw = fields
        .task_type
        .ok_or_else(|| ApiError::Malformed("taskType is required".into()))?;
    let callback_url = fields
        .callback_url
        .ok_or_else(|| ApiError::Malformed("callbackUrl is required".into()))?;
    let image_filename =
        image_filename.ok_or_else(|| ApiError::Malformed("image file is required".into()))?;
    let image_bytes =
        image_bytes.ok_or_else(|| ApiError::Malformed("image file is required".into()))?;

    validation::validate_task_id(&task_id)?;
    let task_type = validation::validate_task_type(&task_type_raw)?;
    validation::validate_callback_url(&callback_url)?;
    validation::validate_patient_info(task_type, &fields.patient_info)?;
    validation::validate_image_extension(
        &image_filename,
        &state.config.image_download.allowed_extensions,
    )?;

    let ext = image_filename
        .rsplit('.')
        .next()
        .unwrap_or("bin")
        .to_ascii_lowercase();
    let dest_path: PathBuf = state.upload_dir.join(format!("{task_id}.{ext}"));
    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    tokio::fs::write(&dest_path, &image_bytes)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let metadata = fields.metadata.unwrap_or_else(|| json!({}));
    let record = TaskRecord {
        task_id,
        task_type,
        image_ref: ImageRef::LocalPath(dest_path.display().to_string()),
        callback_url,
        metadata: metadata.clone(),
        patient_info: fields.patient_info,
        created_at: OffsetDateTime::now_utc(),
        ttl_sec: state.config.store.ttl_sec,
    };

    // On any later failure in the same request the uploaded file is removed.
    match admit(&state, record, metadata).await {
        Ok(response) => Ok(response),
        Err(err) => {
            let _ = tokio::fs::remove_file(&dest_path).await;
            Err(err)
        }
    }
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::Malformed(err.to_string()))
}

/// The atomic admission gate: Store `create` is
/// insert-if-absent; a Queue push failure rolls the Store write back so
/// the client can retry the same taskId instead of waiting out the TTL.
async fn admit(
    state: &AppState,
    record: TaskRecord,
    metadata: Value,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    let outcome = state
        .store
        .create(&record)
        .await
        .map_err(|err| ApiError::StoreUnavailable(err.to_string()))?;

    if outcome == CreateOutcome::AlreadyExists {
        state.metrics.task_rejected();
        return Err(ApiError::DuplicateTaskId(record.task_id));
    }

    if let Err(err) = state.queue.push(&record.task_id).await {
        warn!(task_id = %record.task_id, error = %err, "queue push failed, rolling back store record");
        let _ = state.store.delete(&record.task_id);
        state.metrics.task_rejected();
        return Err(ApiError::QueueUnavailable(err.to_string()));
    }

    state.metrics.task_admitted();
    info!(task_id = %record.task_id, task_type = record.task_type.as_str(), "task admitted");

    let response = AnalyzeResponse {
        task_id: record.task_id,
        status: "QUEUED",
        submitted_at: record.created_at,
        metadata,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// `GET /health` and `GET /api/v1/health`.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.store.health_check().is_ok() && state.queue.health_check().is_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
        }),
    )
}

/// `GET /` service banner.
pub async fn banner() -> &'static str {
    "xray-fabric: dental X-ray analysis request/dispatch/callback fabric\n"
}

