//! Processors turn one observation into one decision.
//!
//! - `DetectionProcessor`: frame -> detection set (inference + filtering)
//! - `ThresholdProcessor`: sensor reading -> threshold verdict
//!
//! The variant is chosen once at startup; the controller only sees the
//! `Processor` trait.

mod detection;
mod threshold;
mod vocabulary;

pub use detection::DetectionProcessor;
pub use threshold::{evaluate_thresholds, ThresholdProcessor, Thresholds};
pub use vocabulary::{label_for, COCO_CLASSES};

use crate::error::LoopError;

pub trait Processor {
    type Input;
    type Output;

    fn evaluate(&mut self, observation: &Self::Input) -> Result<Self::Output, LoopError>;
}
