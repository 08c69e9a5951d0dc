//! Mock cephalometric pipeline, labelled `ceph_pipeline` in logs and
//! output. Requires `patientInfo` — admission already enforces this is
//! present for `cephalometric` tasks, but the pipeline still guards against
//! a missing value rather than trusting it silently.

use std::path::Path;

use serde_json::{json, Value};
use tracing::warn;

use crate::domain::{ErrorKind, PatientInfo};

use super::InferencePipeline;

pub struct CephalometricPipeline;

impl InferencePipeline for CephalometricPipeline {
    fn label(&self) -> &'static str {
        "ceph_pipeline"
    }

    fn run(&self, _image_path: &Path, patient_info: Option<&PatientInfo>) -> Result<Value, ErrorKind> {
        let patient_info = patient_info.ok_or(ErrorKind::InferenceFailure)?;
        warn!(pipeline = self.label(), "running in mock mode, no model weights configured");

        Ok(json!({
            "mock": true,
            "landmarks": [
                {"name": "Sella", "x": 120.5, "y": 85.3, "confidence": 0.92},
                {"name": "Nasion", "x": 135.2, "y": 62.1, "confidence": 0.89},
                {"name": "A_Point", "x": 142.8, "y": 98.7, "confidence": 0.88}
            ],
            "measurements": {
                "SNA": 82.5,
                "SNB": 78.3,
                "ANB": 4.2
            },
            "pixelSpacing": patient_info.pixel_spacing,
        }))
    }
}
