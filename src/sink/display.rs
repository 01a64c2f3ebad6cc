use anyhow::Result;

use super::Sink;
use crate::decision::ThresholdVerdict;
use crate::hal::I2cBus;
use crate::observation::SensorReading;
use crate::session::Shared;

const LCD_COMMAND_REGISTER: u8 = 0x80;
const LCD_DATA_REGISTER: u8 = 0x40;
const LCD_CLEAR: u8 = 0x01;

/// Text shown on the character display, e.g. `T:24.5C H:51% S:Wet L:Good`.
pub fn lcd_text(reading: &SensorReading) -> String {
    format!(
        "T:{}C H:{}% S:{} L:{}",
        reading.temperature_text(),
        reading.humidity_text(),
        reading.soil_state(),
        reading.light_state()
    )
}

/// Optional I2C character display. Best effort: the loop never depends on
/// it succeeding.
pub struct DisplaySink<B: I2cBus> {
    bus: Shared<B>,
    addr: u16,
}

impl<B: I2cBus> DisplaySink<B> {
    pub fn new(bus: Shared<B>, addr: u16) -> Self {
        Self { bus, addr }
    }

    pub fn show(&mut self, text: &str) -> Result<()> {
        let mut bus = self.bus.borrow_mut();
        bus.write_bytes(self.addr, LCD_COMMAND_REGISTER, &[LCD_CLEAR])?;
        for byte in text.bytes().filter(u8::is_ascii) {
            bus.write_bytes(self.addr, LCD_DATA_REGISTER, &[byte])?;
        }
        Ok(())
    }
}

impl<B: I2cBus> Sink<SensorReading, ThresholdVerdict> for DisplaySink<B> {
    fn name(&self) -> &'static str {
        "display"
    }

    fn consume(&mut self, reading: &SensorReading, _verdict: &ThresholdVerdict) -> Result<()> {
        self.show(&lcd_text(reading))
    }
}
