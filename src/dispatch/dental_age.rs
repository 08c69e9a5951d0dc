//! Mock dental-age pipeline, labelled `dental_age_pipeline` in logs and
//! output. Consumes only the image — no auxiliary inputs required.

use std::path::Path;

use serde_json::{json, Value};
use tracing::warn;

use crate::domain::{ErrorKind, PatientInfo};

use super::InferencePipeline;

pub struct DentalAgePipeline;

impl InferencePipeline for DentalAgePipeline {
    fn label(&self) -> &'static str {
        "dental_age_pipeline"
    }

    fn run(&self, _image_path: &Path, _patient_info: Option<&PatientInfo>) -> Result<Value, ErrorKind> {
        warn!(pipeline = self.label(), "running in mock mode, no model weights configured");
        Ok(json!({
            "mock": true,
            "estimatedAgeYears": 24.5,
            "stage": "permanent",
            "confidence": 0.81
        }))
    }
}
