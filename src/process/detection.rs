use super::vocabulary::label_for;
use super::Processor;
use crate::decision::{Detection, DetectionSet};
use crate::detect::{InferenceBackend, InferenceParams};
use crate::error::LoopError;
use crate::observation::VisualFrame;

/// Runs the configured model and keeps confident, labelled detections.
pub struct DetectionProcessor {
    backend: Box<dyn InferenceBackend>,
    params: InferenceParams,
}

impl DetectionProcessor {
    pub fn new(backend: Box<dyn InferenceBackend>, params: InferenceParams) -> Self {
        Self { backend, params }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }
}

impl Processor for DetectionProcessor {
    type Input = VisualFrame;
    type Output = DetectionSet;

    fn evaluate(&mut self, frame: &VisualFrame) -> Result<DetectionSet, LoopError> {
        let raw = self
            .backend
            .predict(&frame.pixels, frame.width, frame.height, &self.params)
            .map_err(LoopError::Inference)?;

        let threshold = self.params.confidence_threshold;
        let detections = raw
            .into_iter()
            .filter(|d| d.confidence.is_finite() && d.confidence >= threshold)
            .map(|d| Detection {
                label: label_for(d.class_id),
                confidence: d.confidence.min(1.0),
                bbox: d.bbox,
            })
            .collect();
        Ok(DetectionSet { detections })
    }
}
