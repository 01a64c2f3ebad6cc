#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::decision::BoundingBox;
use crate::detect::backend::{InferenceBackend, InferenceParams, RawDetection};

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// The model takes a `[1, 3, S, S]` float input in `0..1` and produces
/// `[1, 4 + C, N]`: for each of `N` anchors a centre/size box in input
/// pixels followed by `C` class scores. Frames are resized (nearest
/// neighbour) to `S x S`; boxes are scaled back to frame coordinates.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input)",
            model_path.display(),
            input_size,
            input_size
        );
        Ok(Self { model, input_size })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let side = self.input_size as usize;
        let (w, h) = (width as usize, height as usize);
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let sx = (x * w / side).min(w - 1);
            let sy = (y * h / side).min(h - 1);
            pixels[(sy * w + sx) * 3 + c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        width: u32,
        height: u32,
        params: &InferenceParams,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[1] <= 4 {
            return Err(anyhow!("unexpected output shape {:?}", shape));
        }
        let (rows, anchors) = (shape[1], shape[2]);
        let sx = width as f32 / self.input_size as f32;
        let sy = height as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (class_id, score) = (4..rows)
                .map(|r| (r - 4, view[[0, r, a]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !score.is_finite() || score < params.confidence_threshold {
                continue;
            }
            let (cx, cy, bw, bh) = (
                view[[0, 0, a]],
                view[[0, 1, a]],
                view[[0, 2, a]],
                view[[0, 3, a]],
            );
            candidates.push(RawDetection {
                bbox: BoundingBox {
                    x1: ((cx - bw / 2.0) * sx).max(0.0),
                    y1: ((cy - bh / 2.0) * sy).max(0.0),
                    x2: ((cx + bw / 2.0) * sx).min(width as f32),
                    y2: ((cy + bh / 2.0) * sy).min(height as f32),
                },
                confidence: score.min(1.0),
                class_id,
            });
        }
        Ok(non_max_suppression(candidates, params.iou_threshold))
    }
}

/// Greedy per-class suppression, highest score first.
fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::new();
    for cand in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == cand.class_id && k.bbox.iou(&cand.bbox) > iou_threshold);
        if !overlaps {
            kept.push(cand);
        }
    }
    kept
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn predict(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        params: &InferenceParams,
    ) -> Result<Vec<RawDetection>> {
        if params.input_size != self.input_size {
            return Err(anyhow!(
                "model was loaded for {}px input, asked for {}px",
                self.input_size,
                params.input_size
            ));
        }
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, width, height, params)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let blank = vec![0u8; (side * side * 3) as usize];
        let params = InferenceParams {
            input_size: side,
            ..InferenceParams::default()
        };
        self.predict(&blank, side, side, &params).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, conf: f32, class_id: usize) -> RawDetection {
        RawDetection {
            bbox: BoundingBox {
                x1: x,
                y1: 0.0,
                x2: x + 10.0,
                y2: 10.0,
            },
            confidence: conf,
            class_id,
        }
    }

    #[test]
    fn nms_keeps_strongest_overlapping_box() {
        let kept = non_max_suppression(vec![det(0.0, 0.6, 0), det(1.0, 0.9, 0)], 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn nms_keeps_overlapping_boxes_of_other_classes() {
        let kept = non_max_suppression(vec![det(0.0, 0.6, 0), det(1.0, 0.9, 2)], 0.45);
        assert_eq!(kept.len(), 2);
    }
}
