//! Hardware collaborators.
//!
//! The loop never talks to drivers directly. It sees these capabilities:
//! - `Camera`: configure / start / capture / stop
//! - `Gpio`: binary reads and writes on numbered pins
//! - `I2cBus`: register writes to a device address
//! - `HumitureSensor`: temperature + relative humidity
//! - `FrameWindow`: show a frame, poll a key
//!
//! Every capability is a `Resource`, so it can be owned by a `Session`.
//! Two families of implementations exist:
//! - `synthetic`: in-memory devices for `stub://` configurations and tests
//! - Linux devices: sysfs GPIO, `/dev/i2c-N`, the IIO DHT driver, a terminal
//!   window and (feature: ingest-v4l2) a V4L2 camera

use anyhow::Result;

use crate::observation::VisualFrame;
use crate::session::Resource;

mod normalize;
pub mod synthetic;
pub mod terminal;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use normalize::{normalize_to_rgb, PixelFormat};
pub use synthetic::{HeadlessWindow, MemoryGpio, MemoryI2c, SyntheticCamera, SyntheticHumiture};
pub use terminal::TerminalWindow;

/// Logic level on a digital line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Level::Low
        } else {
            Level::High
        }
    }
}

/// Frame as delivered by a camera, before color normalization.
#[derive(Clone, Debug)]
pub struct RawCapture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Temperature (Celsius) and relative humidity (percent).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Humiture {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

pub trait Camera: Resource {
    fn configure(&mut self, width: u32, height: u32) -> Result<()>;
    fn start(&mut self) -> Result<()>;
    fn capture(&mut self) -> Result<RawCapture>;
    fn stop(&mut self) -> Result<()>;
}

pub trait Gpio: Resource {
    fn read_digital(&mut self, pin: u8) -> Result<Level>;
    fn write_digital(&mut self, pin: u8, level: Level) -> Result<()>;
}

pub trait I2cBus: Resource {
    fn write_bytes(&mut self, addr: u16, register: u8, data: &[u8]) -> Result<()>;
}

pub trait HumitureSensor: Resource {
    fn read(&mut self) -> Result<Humiture>;
}

pub trait FrameWindow: Resource {
    fn show(&mut self, frame: &VisualFrame) -> Result<()>;
    /// Non-blocking; `None` when no key is waiting.
    fn poll_key(&mut self) -> Option<char>;
}

// Boxed capabilities are what the binaries pick at startup from
// configuration; they must still be ownable by a session.

impl Resource for Box<dyn Camera> {
    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

impl Camera for Box<dyn Camera> {
    fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        (**self).configure(width, height)
    }

    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn capture(&mut self) -> Result<RawCapture> {
        (**self).capture()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }
}

impl Resource for Box<dyn Gpio> {
    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

impl Gpio for Box<dyn Gpio> {
    fn read_digital(&mut self, pin: u8) -> Result<Level> {
        (**self).read_digital(pin)
    }

    fn write_digital(&mut self, pin: u8, level: Level) -> Result<()> {
        (**self).write_digital(pin, level)
    }
}

impl Resource for Box<dyn I2cBus> {
    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

impl I2cBus for Box<dyn I2cBus> {
    fn write_bytes(&mut self, addr: u16, register: u8, data: &[u8]) -> Result<()> {
        (**self).write_bytes(addr, register, data)
    }
}

impl Resource for Box<dyn HumitureSensor> {
    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

impl HumitureSensor for Box<dyn HumitureSensor> {
    fn read(&mut self) -> Result<Humiture> {
        (**self).read()
    }
}

impl Resource for Box<dyn FrameWindow> {
    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

impl FrameWindow for Box<dyn FrameWindow> {
    fn show(&mut self, frame: &VisualFrame) -> Result<()> {
        (**self).show(frame)
    }

    fn poll_key(&mut self) -> Option<char> {
        (**self).poll_key()
    }
}
