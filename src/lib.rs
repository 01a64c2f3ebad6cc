//! Edge Sentry
//!
//! Sample / process / act loops for small single-board devices.
//!
//! Two loops share one control skeleton:
//!
//! 1. **Vision**: capture a camera frame, run object detection, draw the
//!    detections and present the frame until the exit key or Ctrl-C.
//! 2. **Environment**: read humiture, soil moisture and light, compare them
//!    against fixed thresholds, then log, display and sound an alert on a
//!    breach, once per interval until Ctrl-C.
//!
//! # Module Structure
//!
//! - `session`: scoped acquisition of hardware handles, released in reverse order
//! - `hal`: capability traits (camera, GPIO, I2C, humiture, window) and devices
//! - `source`: one observation per iteration
//! - `process` / `detect`: one decision per observation
//! - `sink`: independent output channels
//! - `controller`: the loop state machine
//! - `config`: one immutable configuration, file + environment

pub mod config;
pub mod controller;
pub mod decision;
pub mod detect;
pub mod error;
pub mod hal;
pub mod observation;
pub mod overlay;
pub mod process;
pub mod session;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod ui;

pub use config::MonitorConfig;
pub use controller::{Cadence, LoopController, LoopState, Pipeline, RunSummary};
pub use decision::{BoundingBox, Detection, DetectionSet, Reason, ThresholdVerdict};
pub use error::LoopError;
pub use observation::{SensorReading, VisualFrame};
pub use process::{DetectionProcessor, Processor, ThresholdProcessor, Thresholds};
pub use session::{Resource, Session, SessionBuilder, Shared};
pub use shutdown::ShutdownSignal;
pub use sink::{Sink, SinkSet};
pub use source::{EnvironmentPins, EnvironmentSource, SampleSource, VisionSource};
