//! Decisions: the interpreted result of an observation, broadcast to every
//! sink and then dropped.

use std::collections::BTreeSet;
use std::fmt;

/// Axis-aligned box in frame pixel coordinates (top-left, bottom-right).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Always within `0.0..=1.0`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    /// Overlay caption, e.g. `person 0.82`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }
}

/// Detections for one frame, in the order the model produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }
}

/// Why a threshold verdict fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reason {
    HighTemp,
    LowHumidity,
    DrySoil,
    LowLight,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::HighTemp => "high temperature",
            Reason::LowHumidity => "low humidity",
            Reason::DrySoil => "dry soil",
            Reason::LowLight => "low light",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThresholdVerdict {
    pub exceeded: bool,
    pub reasons: BTreeSet<Reason>,
}

impl ThresholdVerdict {
    pub fn from_reasons(reasons: BTreeSet<Reason>) -> Self {
        Self {
            exceeded: !reasons.is_empty(),
            reasons,
        }
    }

    /// Comma separated reasons, for log lines.
    pub fn describe(&self) -> String {
        self.reasons
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
