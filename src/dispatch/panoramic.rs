//! Mock panoramic pipeline, labelled `pano_pipeline` in logs and output.

use std::path::Path;

use serde_json::{json, Value};
use tracing::warn;

use crate::domain::{ErrorKind, PatientInfo};

use super::InferencePipeline;

pub struct PanoramicPipeline;

impl InferencePipeline for PanoramicPipeline {
    fn label(&self) -> &'static str {
        "pano_pipeline"
    }

    fn run(&self, _image_path: &Path, _patient_info: Option<&PatientInfo>) -> Result<Value, ErrorKind> {
        warn!(pipeline = self.label(), "running in mock mode, no model weights configured");
        Ok(json!({
            "mock": true,
            "teeth": [
                {"id": 11, "status": "healthy", "confidence": 0.95},
                {"id": 12, "status": "healthy", "confidence": 0.93},
                {"id": 21, "status": "caries", "confidence": 0.87},
                {"id": 22, "status": "healthy", "confidence": 0.91}
            ],
            "diseases": [
                {
                    "type": "caries",
                    "location": "tooth_21",
                    "severity": "mild",
                    "confidence": 0.87
                }
            ]
        }))
    }
}
