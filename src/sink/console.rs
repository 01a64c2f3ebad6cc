use anyhow::Result;

use super::Sink;
use crate::decision::{DetectionSet, ThresholdVerdict};
use crate::observation::{SensorReading, VisualFrame};

/// Mirrors every decision into the process log.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink<SensorReading, ThresholdVerdict> for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn consume(&mut self, reading: &SensorReading, verdict: &ThresholdVerdict) -> Result<()> {
        log::info!(
            "Temp: {}C, Hum: {}%, Soil: {}, Light: {}",
            reading.temperature_text(),
            reading.humidity_text(),
            reading.soil_state(),
            reading.light_state()
        );
        if verdict.exceeded {
            log::warn!("Threshold exceeded: {}", verdict.describe());
        }
        Ok(())
    }
}

impl Sink<VisualFrame, DetectionSet> for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn consume(&mut self, frame: &VisualFrame, detections: &DetectionSet) -> Result<()> {
        if detections.is_empty() {
            return Ok(());
        }
        let captions: Vec<String> = detections.iter().map(|d| d.caption()).collect();
        log::debug!(
            "{}x{} frame: {} detection(s): {}",
            frame.width,
            frame.height,
            detections.len(),
            captions.join("; ")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Reason;
    use chrono::Local;

    #[test]
    fn reporting_never_fails() {
        let mut sink = ConsoleSink::new();
        let reading = SensorReading {
            temperature: Some(31.0),
            humidity: None,
            soil_wet: true,
            light_good: true,
            soil_read_failed: false,
            light_read_failed: false,
            timestamp: Local::now(),
        };
        let verdict = ThresholdVerdict::from_reasons([Reason::HighTemp].into_iter().collect());
        let outcome =
            Sink::<SensorReading, ThresholdVerdict>::consume(&mut sink, &reading, &verdict);
        assert!(outcome.is_ok());

        let frame = VisualFrame::new(vec![0; 12], 2, 2);
        let detections = DetectionSet::default();
        let outcome = Sink::<VisualFrame, DetectionSet>::consume(&mut sink, &frame, &detections);
        assert!(outcome.is_ok());
    }
}
