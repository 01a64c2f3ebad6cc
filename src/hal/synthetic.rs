//! In-memory devices.
//!
//! Used for `stub://` configurations and tests. They behave like the real
//! drivers closely enough to exercise the loop: cameras must be started
//! before capture, released devices refuse further I/O, and failures can be
//! injected per pin or per frame.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{
    Camera, FrameWindow, Gpio, Humiture, HumitureSensor, I2cBus, Level, PixelFormat, RawCapture,
};
use crate::observation::VisualFrame;
use crate::session::Resource;

// ----------------------------------------------------------------------------
// Camera
// ----------------------------------------------------------------------------

/// Pattern-generating camera for `stub://` URLs.
pub struct SyntheticCamera {
    url: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    started: bool,
    frame_count: u64,
    scene_state: u8,
    fail_every: Option<u64>,
}

impl SyntheticCamera {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: 640,
            height: 480,
            format: PixelFormat::Bgr24,
            started: false,
            frame_count: 0,
            scene_state: 0,
            fail_every: None,
        }
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Drop every `n`th frame, as a busy sensor would.
    pub fn fail_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn frame_len(&self) -> usize {
        let pixels = self.width as usize * self.height as usize;
        match self.format {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => pixels * 3,
            PixelFormat::Nv12 => pixels + pixels / 2,
            PixelFormat::Yuyv => pixels * 2,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        // Scene changes every 50 frames so motion shows up in long runs.
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; self.frame_len()];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl Camera for SyntheticCamera {
    fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        if self.started {
            return Err(anyhow!("cannot reconfigure {} while running", self.url));
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("invalid resolution {}x{}", width, height));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        log::info!(
            "SyntheticCamera: started {} ({}x{}, {:?})",
            self.url,
            self.width,
            self.height,
            self.format
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<RawCapture> {
        if !self.started {
            return Err(anyhow!("camera {} is not started", self.url));
        }
        self.frame_count += 1;
        if let Some(n) = self.fail_every {
            if self.frame_count % n == 0 {
                return Err(anyhow!("no frame from {} (frame {})", self.url, self.frame_count));
            }
        }
        Ok(RawCapture {
            data: self.generate_pixels(),
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }
}

impl Resource for SyntheticCamera {
    fn release(&mut self) -> Result<()> {
        if self.started {
            self.stop()?;
        }
        log::info!(
            "SyntheticCamera: closed {} after {} frames",
            self.url,
            self.frame_count
        );
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// GPIO
// ----------------------------------------------------------------------------

/// GPIO controller backed by a pin map.
#[derive(Default)]
pub struct MemoryGpio {
    inputs: HashMap<u8, Level>,
    failing: HashSet<u8>,
    writes: Vec<(u8, Level)>,
    outputs: HashMap<u8, Level>,
    released: bool,
    fail_release: bool,
}

impl MemoryGpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, pin: u8, level: Level) -> Self {
        self.inputs.insert(pin, level);
        self
    }

    pub fn set_input(&mut self, pin: u8, level: Level) {
        self.inputs.insert(pin, level);
    }

    /// Make reads on `pin` fail until further notice.
    pub fn fail_reads(&mut self, pin: u8) {
        self.failing.insert(pin);
    }

    pub fn fail_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Every write, in order.
    pub fn writes(&self) -> &[(u8, Level)] {
        &self.writes
    }

    /// Last level driven on `pin`.
    pub fn output(&self, pin: u8) -> Option<Level> {
        self.outputs.get(&pin).copied()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn ensure_open(&self) -> Result<()> {
        if self.released {
            return Err(anyhow!("gpio controller already released"));
        }
        Ok(())
    }
}

impl Gpio for MemoryGpio {
    fn read_digital(&mut self, pin: u8) -> Result<Level> {
        self.ensure_open()?;
        if self.failing.contains(&pin) {
            return Err(anyhow!("read on pin {} failed", pin));
        }
        self.inputs
            .get(&pin)
            .copied()
            .ok_or_else(|| anyhow!("pin {} is not configured as input", pin))
    }

    fn write_digital(&mut self, pin: u8, level: Level) -> Result<()> {
        self.ensure_open()?;
        self.writes.push((pin, level));
        self.outputs.insert(pin, level);
        Ok(())
    }
}

impl Resource for MemoryGpio {
    fn release(&mut self) -> Result<()> {
        for level in self.outputs.values_mut() {
            *level = Level::Low;
        }
        self.released = true;
        if self.fail_release {
            return Err(anyhow!("gpio cleanup failed"));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// I2C
// ----------------------------------------------------------------------------

/// I2C bus that records every register write.
#[derive(Default)]
pub struct MemoryI2c {
    writes: Vec<(u16, u8, Vec<u8>)>,
    failing: bool,
    released: bool,
}

impl MemoryI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent write fails (device unplugged).
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn writes(&self) -> &[(u16, u8, Vec<u8>)] {
        &self.writes
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl I2cBus for MemoryI2c {
    fn write_bytes(&mut self, addr: u16, register: u8, data: &[u8]) -> Result<()> {
        if self.released {
            return Err(anyhow!("i2c bus already released"));
        }
        if self.failing {
            return Err(anyhow!("no ack from device 0x{:02x}", addr));
        }
        self.writes.push((addr, register, data.to_vec()));
        Ok(())
    }
}

impl Resource for MemoryI2c {
    fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Humiture
// ----------------------------------------------------------------------------

/// Humiture sensor that either replays a script or drifts randomly.
pub struct SyntheticHumiture {
    script: VecDeque<Option<Humiture>>,
    rng: StdRng,
    current: Humiture,
}

impl SyntheticHumiture {
    /// Random walk around 24 C / 50 %, reproducible for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            script: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
            current: Humiture {
                temperature_c: 24.0,
                humidity_pct: 50.0,
            },
        }
    }

    /// Replay readings in order; `None` entries fail the read. Falls back to
    /// the random walk once the script runs out.
    pub fn scripted(readings: impl IntoIterator<Item = Option<Humiture>>) -> Self {
        Self {
            script: readings.into_iter().collect(),
            ..Self::seeded(0)
        }
    }
}

impl HumitureSensor for SyntheticHumiture {
    fn read(&mut self) -> Result<Humiture> {
        if let Some(next) = self.script.pop_front() {
            return next.ok_or_else(|| anyhow!("checksum mismatch from humiture sensor"));
        }
        self.current.temperature_c =
            (self.current.temperature_c + self.rng.gen_range(-0.8..0.8)).clamp(10.0, 40.0);
        self.current.humidity_pct =
            (self.current.humidity_pct + self.rng.gen_range(-2.0..2.0)).clamp(20.0, 90.0);
        Ok(self.current)
    }
}

impl Resource for SyntheticHumiture {
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Window
// ----------------------------------------------------------------------------

/// Window that keeps the last frame instead of drawing it.
#[derive(Default)]
pub struct HeadlessWindow {
    shown: u64,
    last_frame: Option<VisualFrame>,
    key_after: Option<(u64, char)>,
    released: bool,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `key` as pressed once `frames` frames have been shown.
    pub fn with_key_after(mut self, frames: u64, key: char) -> Self {
        self.key_after = Some((frames, key));
        self
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }

    pub fn last_frame(&self) -> Option<&VisualFrame> {
        self.last_frame.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl FrameWindow for HeadlessWindow {
    fn show(&mut self, frame: &VisualFrame) -> Result<()> {
        if self.released {
            return Err(anyhow!("window already destroyed"));
        }
        self.shown += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        match self.key_after {
            Some((frames, key)) if self.shown >= frames => Some(key),
            _ => None,
        }
    }
}

impl Resource for HeadlessWindow {
    fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}
