//! Sample sources: produce one observation per loop iteration.
//!
//! - `VisionSource`: one camera frame, normalized to RGB24
//! - `EnvironmentSource`: humiture + soil + light, each read independently
//!
//! A vision capture failure fails the sample (nothing to process). An
//! environment channel failure only blanks that channel: one dead sensor
//! never blocks the others.

use chrono::Local;

use crate::error::LoopError;
use crate::hal::{normalize_to_rgb, Camera, Gpio, HumitureSensor, Level};
use crate::observation::{SensorReading, VisualFrame};
use crate::session::Shared;

pub trait SampleSource {
    type Output;

    fn sample(&mut self) -> Result<Self::Output, LoopError>;
}

pub struct VisionSource<C: Camera> {
    camera: Shared<C>,
}

impl<C: Camera> VisionSource<C> {
    /// The camera must already be configured and started.
    pub fn new(camera: Shared<C>) -> Self {
        Self { camera }
    }
}

impl<C: Camera> SampleSource for VisionSource<C> {
    type Output = VisualFrame;

    fn sample(&mut self) -> Result<VisualFrame, LoopError> {
        let raw = self
            .camera
            .borrow_mut()
            .capture()
            .map_err(LoopError::Capture)?;
        let pixels = normalize_to_rgb(&raw.data, raw.width, raw.height, raw.format)
            .map_err(LoopError::Capture)?;
        Ok(VisualFrame::new(pixels, raw.width, raw.height))
    }
}

/// Pin assignment for the digital environment channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvironmentPins {
    pub soil: u8,
    pub light: u8,
}

pub struct EnvironmentSource<H: HumitureSensor, G: Gpio> {
    humiture: Shared<H>,
    gpio: Shared<G>,
    pins: EnvironmentPins,
}

impl<H: HumitureSensor, G: Gpio> EnvironmentSource<H, G> {
    pub fn new(humiture: Shared<H>, gpio: Shared<G>, pins: EnvironmentPins) -> Self {
        Self {
            humiture,
            gpio,
            pins,
        }
    }

    /// `None` when the line could not be read.
    fn read_digital(&self, channel: &'static str, pin: u8) -> Option<bool> {
        match self.gpio.borrow_mut().read_digital(pin) {
            Ok(level) => Some(level == Level::High),
            Err(cause) => {
                let err = LoopError::SensorRead { channel, cause };
                log::warn!("{}; treating as low", err);
                None
            }
        }
    }
}

impl<H: HumitureSensor, G: Gpio> SampleSource for EnvironmentSource<H, G> {
    type Output = SensorReading;

    fn sample(&mut self) -> Result<SensorReading, LoopError> {
        let (temperature, humidity) = match self.humiture.borrow_mut().read() {
            Ok(h) => (Some(round2(h.temperature_c)), Some(round2(h.humidity_pct))),
            Err(cause) => {
                let err = LoopError::SensorRead {
                    channel: "humiture",
                    cause,
                };
                log::warn!("{}", err);
                (None, None)
            }
        };
        let soil = self.read_digital("soil", self.pins.soil);
        let light = self.read_digital("light", self.pins.light);

        Ok(SensorReading {
            temperature,
            humidity,
            soil_wet: soil.unwrap_or(false),
            light_good: light.unwrap_or(false),
            soil_read_failed: soil.is_none(),
            light_read_failed: light.is_none(),
            timestamp: Local::now(),
        })
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
