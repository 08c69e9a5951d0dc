//! Request validation for `POST /api/v1/analyze`, checked in order: taskId
//! shape, taskType allow-set, callbackUrl scheme, cephalometric patientInfo
//! presence, and (multipart only) file extension.

use crate::api::error::ApiError;
use crate::domain::{PatientInfo, TaskType};

pub fn validate_task_id(task_id: &str) -> Result<(), ApiError> {
    let uuid = uuid::Uuid::parse_str(task_id)
        .map_err(|_| ApiError::Malformed(format!("taskId '{task_id}' is not a valid UUID")))?;
    if uuid.get_version_num() != 4 {
        return Err(ApiError::Malformed(format!(
            "taskId '{task_id}' is not a UUIDv4"
        )));
    }
    Ok(())
}

pub fn validate_task_type(task_type: &str) -> Result<TaskType, ApiError> {
    TaskType::parse(task_type)
        .ok_or_else(|| ApiError::Malformed(format!("unsupported taskType '{task_type}'")))
}

pub fn validate_callback_url(callback_url: &str) -> Result<(), ApiError> {
    validate_http_url(callback_url, "callbackUrl")
}

pub fn validate_image_url(image_url: &str) -> Result<(), ApiError> {
    validate_http_url(image_url, "imageUrl")
}

fn validate_http_url(url: &str, field: &str) -> Result<(), ApiError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| ApiError::Malformed(format!("{field} '{url}' is not a valid URL")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ApiError::Malformed(format!(
            "{field} scheme '{other}' is not http/https"
        ))),
    }
}

pub fn validate_patient_info(
    task_type: TaskType,
    patient_info: &Option<PatientInfo>,
) -> Result<(), ApiError> {
    if task_type == TaskType::Cephalometric && patient_info.is_none() {
        return Err(ApiError::Malformed(
            "cephalometric tasks require patientInfo.gender and patientInfo.DentalAgeStage".into(),
        ));
    }
    Ok(())
}

pub fn validate_image_extension(filename: &str, allowed: &[String]) -> Result<(), ApiError> {
    let lower = filename.to_ascii_lowercase();
    match lower.rfind('.') {
        Some(dot) if allowed.iter().any(|ext| ext.eq_ignore_ascii_case(&lower[dot..])) => Ok(()),
        _ => Err(ApiError::UnsupportedMedia(format!(
            "image file '{filename}' has an unsupported extension"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid_v4() {
        assert!(validate_task_id("11111111-1111-4111-8111-111111111111").is_ok());
    }

    #[test]
    fn rejects_non_v4_uuid() {
        // Version 1 UUID shape.
        assert!(validate_task_id("11111111-1111-1111-8111-111111111111").is_err());
    }

    #[test]
    fn rejects_non_uuid_string() {
        assert!(validate_task_id("not-a-uuid").is_err());
    }

    #[test]
    fn rejects_unknown_task_type() {
        assert!(validate_task_type("orthodontic").is_err());
    }

    #[test]
    fn rejects_non_http_callback_scheme() {
        assert!(validate_callback_url("ftp://cb.local/r").is_err());
        assert!(validate_callback_url("http://cb.local/r").is_ok());
    }

    #[test]
    fn cephalometric_requires_patient_info() {
        assert!(validate_patient_info(TaskType::Cephalometric, &None).is_err());
        assert!(validate_patient_info(TaskType::Panoramic, &None).is_ok());
    }

    #[test]
    fn rejects_disallowed_extension() {
        let allowed = vec![".jpg".to_string(), ".png".to_string()];
        assert!(validate_image_extension("scan.jpg", &allowed).is_ok());
        assert!(validate_image_extension("scan.gif", &allowed).is_err());
        assert!(validate_image_extension("scan", &allowed).is_err());
    }
}
