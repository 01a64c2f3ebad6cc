//! Observations: one raw sample pulled from a sensing capability per loop
//! iteration. Observations are created fresh every iteration and dropped as
//! soon as their decision has been derived.

use chrono::{DateTime, Local};

/// Marker written wherever a reading is absent. Never a default value.
pub const UNAVAILABLE: &str = "N/A";

/// A camera frame, normalized to packed RGB24.
#[derive(Clone, Debug)]
pub struct VisualFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Local>,
}

impl VisualFrame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp: Local::now(),
        }
    }
}

/// One pass over the environment sensors.
///
/// `None` means the sensor could not be read this iteration. A digital
/// channel that could not be read is negative (dry soil, low light) for the
/// threshold check but flagged, so its state text is `N/A`.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorReading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub soil_wet: bool,
    pub light_good: bool,
    pub soil_read_failed: bool,
    pub light_read_failed: bool,
    pub timestamp: DateTime<Local>,
}

impl SensorReading {
    pub fn soil_state(&self) -> &'static str {
        if self.soil_read_failed {
            UNAVAILABLE
        } else if self.soil_wet {
            "Wet"
        } else {
            "Dry"
        }
    }

    pub fn light_state(&self) -> &'static str {
        if self.light_read_failed {
            UNAVAILABLE
        } else if self.light_good {
            "Good"
        } else {
            "Low"
        }
    }

    pub fn temperature_text(&self) -> String {
        format_optional(self.temperature)
    }

    pub fn humidity_text(&self) -> String {
        format_optional(self.humidity)
    }
}

/// Render an optional measurement, surfacing absence explicitly.
pub fn format_optional(value: Option<f32>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => UNAVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_render_as_marker() {
        let reading = SensorReading {
            temperature: None,
            humidity: Some(41.5),
            soil_wet: false,
            light_good: true,
            soil_read_failed: false,
            light_read_failed: false,
            timestamp: Local::now(),
        };
        assert_eq!(reading.temperature_text(), UNAVAILABLE);
        assert_eq!(reading.humidity_text(), "41.5");
        assert_eq!(reading.soil_state(), "Dry");
        assert_eq!(reading.light_state(), "Good");
    }

    #[test]
    fn unreadable_digital_channel_renders_as_marker() {
        let reading = SensorReading {
            temperature: Some(20.0),
            humidity: Some(40.0),
            soil_wet: false,
            light_good: false,
            soil_read_failed: true,
            light_read_failed: false,
            timestamp: Local::now(),
        };
        assert_eq!(reading.soil_state(), UNAVAILABLE);
        assert_eq!(reading.light_state(), "Low");
    }
}
