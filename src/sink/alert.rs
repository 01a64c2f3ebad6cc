use std::time::Duration;

use anyhow::Result;

use super::Sink;
use crate::decision::ThresholdVerdict;
use crate::hal::{Gpio, Level};
use crate::observation::SensorReading;
use crate::session::Shared;

/// Buzzer pulse on a threshold breach. The pulse blocks the loop for its
/// duration.
pub struct AlertSink<G: Gpio> {
    gpio: Shared<G>,
    pin: u8,
    pulse: Duration,
}

impl<G: Gpio> AlertSink<G> {
    pub fn new(gpio: Shared<G>, pin: u8, pulse: Duration) -> Self {
        Self { gpio, pin, pulse }
    }

    pub fn trigger(&mut self, verdict: &ThresholdVerdict) -> Result<()> {
        if !verdict.exceeded {
            return Ok(());
        }
        let high = self.gpio.borrow_mut().write_digital(self.pin, Level::High);
        if high.is_ok() {
            std::thread::sleep(self.pulse);
        }
        // The pin is driven low even when raising it failed.
        let low = self.gpio.borrow_mut().write_digital(self.pin, Level::Low);
        high.and(low)
    }
}

impl<G: Gpio> Sink<SensorReading, ThresholdVerdict> for AlertSink<G> {
    fn name(&self) -> &'static str {
        "alert"
    }

    fn consume(&mut self, _reading: &SensorReading, verdict: &ThresholdVerdict) -> Result<()> {
        self.trigger(verdict)
    }
}
