use anyhow::Result;

use crate::decision::BoundingBox;

/// Knobs passed to the model on every call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceParams {
    /// Square side the frame is down-scaled to before inference.
    pub input_size: u32,
    /// Minimum score a candidate needs to be reported.
    pub confidence_threshold: f32,
    /// Overlap above which weaker boxes of the same class are suppressed.
    pub iou_threshold: f32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            input_size: 320,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
        }
    }
}

/// One candidate as the model reports it: a box in frame pixel
/// coordinates, a score and a numeric class id.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

/// Object-detection model.
///
/// The backend is opaque to the loop: it gets RGB24 pixels and hands back
/// candidates. Label vocabulary and confidence filtering belong to the
/// detection processor, not the backend.
pub trait InferenceBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one frame.
    fn predict(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        params: &InferenceParams,
    ) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, run once at startup.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
