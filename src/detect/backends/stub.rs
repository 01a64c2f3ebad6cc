use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::decision::BoundingBox;
use crate::detect::backend::{InferenceBackend, InferenceParams, RawDetection};

/// Stub backend for testing and `stub://` runs.
///
/// Without a script it hashes each frame and reports a centred "person"
/// whenever the frame content changes. With a script it replays the given
/// outcomes in order, then falls back to hashing.
pub struct StubBackend {
    last_hash: Option<[u8; 32]>,
    script: VecDeque<Result<Vec<RawDetection>, String>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            last_hash: None,
            script: VecDeque::new(),
        }
    }

    /// Replay outcomes; an `Err` makes that call fail with the message.
    pub fn scripted(
        outcomes: impl IntoIterator<Item = Result<Vec<RawDetection>, String>>,
    ) -> Self {
        Self {
            last_hash: None,
            script: outcomes.into_iter().collect(),
        }
    }

    fn motion_detection(&mut self, pixels: &[u8], width: u32, height: u32) -> Vec<RawDetection> {
        let current: [u8; 32] = Sha256::digest(pixels).into();
        let motion = self.last_hash.is_some_and(|prev| prev != current);
        self.last_hash = Some(current);
        if !motion {
            return Vec::new();
        }
        let (w, h) = (width as f32, height as f32);
        vec![RawDetection {
            bbox: BoundingBox {
                x1: w * 0.25,
                y1: h * 0.25,
                x2: w * 0.75,
                y2: h * 0.75,
            },
            confidence: 0.85,
            class_id: 0,
        }]
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn predict(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        _params: &InferenceParams,
    ) -> Result<Vec<RawDetection>> {
        match self.script.pop_front() {
            Some(outcome) => outcome.map_err(|msg| anyhow!(msg)),
            None => Ok(self.motion_detection(pixels, width, height)),
        }
    }
}
