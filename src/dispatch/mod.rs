//! Inference Dispatcher: routes a task to the pipeline matching
//! its `taskType` and returns the pipeline's result or a structured error.
//!
//! Pipelines are a small `InferencePipeline` trait plus a registration
//! table the dispatcher consults by `TaskType` — no inheritance hierarchy.
//! Every pipeline here runs in mock mode — no model weights ship with this
//! repo — and stamps `data.mock: true` on its output while logging a
//! `warn!`.

mod cephalometric;
mod dental_age;
mod panoramic;

use std::path::Path;

use serde_json::Value;

use crate::domain::{ErrorKind, PatientInfo, TaskType};

/// A single inference pipeline. Implementations are synchronous and
/// CPU-bound in the mock case; a real model wrapper would likely want
/// `async fn` here, but the trait is kept sync since every implementation
/// in this repo is a pure function of its inputs.
pub trait InferencePipeline: Send + Sync {
    /// Stable label used in logs and mock payloads, one per taskType.
    fn label(&self) -> &'static str;

    fn run(
        &self,
        image_path: &Path,
        patient_info: Option<&PatientInfo>,
    ) -> Result<Value, ErrorKind>;
}

/// Holds one boxed pipeline per `TaskType`. Constructed once at startup.
pub struct PipelineRegistry {
    panoramic: Box<dyn InferencePipeline>,
    cephalometric: Box<dyn InferencePipeline>,
    dental_age: Box<dyn InferencePipeline>,
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self {
            panoramic: Box::new(panoramic::PanoramicPipeline),
            cephalometric: Box::new(cephalometric::CephalometricPipeline),
            dental_age: Box::new(dental_age::DentalAgePipeline),
        }
    }
}

impl PipelineRegistry {
    pub fn get(&self, task_type: TaskType) -> &dyn InferencePipeline {
        match task_type {
            TaskType::Panoramic => self.panoramic.as_ref(),
            TaskType::Cephalometric => self.cephalometric.as_ref(),
            TaskType::DentalAge => self.dental_age.as_ref(),
        }
    }

    /// Runs the pipeline matching `task_type` against `image_path`,
    /// forwarding `patient_info` (required only for cephalometric).
    pub fn dispatch(
        &self,
        task_type: TaskType,
        image_path: &Path,
        patient_info: Option<&PatientInfo>,
    ) -> Result<Value, ErrorKind> {
        self.get(task_type).run(image_path, patient_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn dispatch_routes_by_task_type_and_stamps_mock_flag() {
        let registry = PipelineRegistry::default();
        let path = PathBuf::from("/tmp/does-not-need-to-exist.jpg");

        let result = registry
            .dispatch(TaskType::Panoramic, &path, None)
            .unwrap();
        assert_eq!(result["mock"], Value::Bool(true));

        let result = registry
            .dispatch(TaskType::DentalAge, &path, None)
            .unwrap();
        assert_eq!(result["mock"], Value::Bool(true));
    }
}
