//! Linux device backends.
//!
//! - `SysfsGpio`: `/sys/class/gpio` export/direction/value files
//! - `I2cDevBus`: `/dev/i2c-N` with the `I2C_SLAVE` ioctl
//! - `IioHumiture`: DHT11/DHT22 exposed by the kernel `dht11` IIO driver
//!
//! All paths are configurable so the backends can be pointed at a fixture
//! tree in tests.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{Gpio, Humiture, HumitureSensor, I2cBus, Level};
use crate::session::Resource;

// ioctl request from linux/i2c-dev.h
const I2C_SLAVE: libc::c_ulong = 0x0703;

// ----------------------------------------------------------------------------
// GPIO
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    In,
    Out,
}

/// GPIO lines driven through the sysfs interface.
pub struct SysfsGpio {
    root: PathBuf,
    lines: Vec<(u8, Direction)>,
}

impl SysfsGpio {
    /// Export and configure every pin. Fails on the first pin that cannot be
    /// set up, unexporting the ones already configured.
    pub fn open(root: impl Into<PathBuf>, inputs: &[u8], outputs: &[u8]) -> Result<Self> {
        let mut gpio = Self {
            root: root.into(),
            lines: Vec::new(),
        };
        let pins = inputs
            .iter()
            .map(|&p| (p, Direction::In))
            .chain(outputs.iter().map(|&p| (p, Direction::Out)));
        for (pin, direction) in pins {
            if let Err(err) = gpio.setup(pin, direction) {
                if let Err(cleanup) = gpio.cleanup() {
                    log::warn!("SysfsGpio: cleanup after failed setup: {:#}", cleanup);
                }
                return Err(err);
            }
        }
        log::info!(
            "SysfsGpio: configured {} line(s) under {}",
            gpio.lines.len(),
            gpio.root.display()
        );
        Ok(gpio)
    }

    fn line_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn setup(&mut self, pin: u8, direction: Direction) -> Result<()> {
        if !self.line_dir(pin).exists() {
            write_attr(&self.root.join("export"), &pin.to_string())
                .with_context(|| format!("export gpio {}", pin))?;
        }
        let dir = match direction {
            Direction::In => "in",
            Direction::Out => "low",
        };
        write_attr(&self.line_dir(pin).join("direction"), dir)
            .with_context(|| format!("set direction of gpio {}", pin))?;
        self.lines.push((pin, direction));
        Ok(())
    }

    fn direction(&self, pin: u8) -> Option<Direction> {
        self.lines
            .iter()
            .find(|(p, _)| *p == pin)
            .map(|(_, d)| *d)
    }

    fn cleanup(&mut self) -> Result<()> {
        let mut first_error = None;
        for (pin, direction) in std::mem::take(&mut self.lines).into_iter().rev() {
            let line = self.line_dir(pin);
            let result = (|| -> Result<()> {
                if direction == Direction::Out {
                    write_attr(&line.join("value"), "0")?;
                }
                write_attr(&self.root.join("unexport"), &pin.to_string())
            })();
            if let Err(err) = result {
                log::warn!("SysfsGpio: failed to clean up gpio {}: {:#}", pin, err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Gpio for SysfsGpio {
    fn read_digital(&mut self, pin: u8) -> Result<Level> {
        if self.direction(pin) != Some(Direction::In) {
            return Err(anyhow!("gpio {} is not configured as input", pin));
        }
        let path = self.line_dir(pin).join("value");
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        match raw.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(anyhow!("unexpected value {:?} on gpio {}", other, pin)),
        }
    }

    fn write_digital(&mut self, pin: u8, level: Level) -> Result<()> {
        if self.direction(pin) != Some(Direction::Out) {
            return Err(anyhow!("gpio {} is not configured as output", pin));
        }
        let value = if level.is_high() { "1" } else { "0" };
        write_attr(&self.line_dir(pin).join("value"), value)
    }
}

impl Resource for SysfsGpio {
    fn release(&mut self) -> Result<()> {
        self.cleanup()
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(value.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

// ----------------------------------------------------------------------------
// I2C
// ----------------------------------------------------------------------------

/// An open `/dev/i2c-N` character device.
pub struct I2cDevBus {
    path: PathBuf,
    file: Option<File>,
    current_addr: Option<u16>,
}

impl I2cDevBus {
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open i2c bus {}", path.display()))?;
        log::info!("I2cDevBus: opened {}", path.display());
        Ok(Self {
            path,
            file: Some(file),
            current_addr: None,
        })
    }

    fn select(&mut self, addr: u16) -> Result<()> {
        if self.current_addr == Some(addr) {
            return Ok(());
        }
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| anyhow!("i2c bus {} is closed", self.path.display()))?;
        // SAFETY: valid open fd; I2C_SLAVE takes the address by value.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), I2C_SLAVE as _, addr as libc::c_ulong) };
        if rc < 0 {
            return Err(anyhow!(
                "select i2c device 0x{:02x}: {}",
                addr,
                std::io::Error::last_os_error()
            ));
        }
        self.current_addr = Some(addr);
        Ok(())
    }
}

impl I2cBus for I2cDevBus {
    fn write_bytes(&mut self, addr: u16, register: u8, data: &[u8]) -> Result<()> {
        self.select(addr)?;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| anyhow!("i2c bus {} is closed", self.path.display()))?;
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(register);
        frame.extend_from_slice(data);
        file.write_all(&frame)
            .with_context(|| format!("write to i2c device 0x{:02x}", addr))
    }
}

impl Resource for I2cDevBus {
    fn release(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            log::info!("I2cDevBus: closed {}", self.path.display());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Humiture (IIO)
// ----------------------------------------------------------------------------

/// DHT sensor read through `/sys/bus/iio/devices/iio:deviceN`.
///
/// The driver reports milli-degrees Celsius and milli-percent.
pub struct IioHumiture {
    dir: PathBuf,
}

impl IioHumiture {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        for attr in ["in_temp_input", "in_humidityrelative_input"] {
            if !dir.join(attr).exists() {
                return Err(anyhow!("{} has no {}", dir.display(), attr));
            }
        }
        Ok(Self { dir })
    }

    fn read_milli(&self, attr: &str) -> Result<f32> {
        let path = self.dir.join(attr);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let milli: i64 = raw
            .trim()
            .parse()
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(milli as f32 / 1000.0)
    }
}

impl HumitureSensor for IioHumiture {
    fn read(&mut self) -> Result<Humiture> {
        Ok(Humiture {
            temperature_c: self.read_milli("in_temp_input")?,
            humidity_pct: self.read_milli("in_humidityrelative_input")?,
        })
    }
}

impl Resource for IioHumiture {
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_gpio_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("export"), "").unwrap();
        std::fs::write(dir.path().join("unexport"), "").unwrap();
        for pin in [17u8, 22] {
            let line = dir.path().join(format!("gpio{}", pin));
            std::fs::create_dir(&line).unwrap();
            std::fs::write(line.join("direction"), "").unwrap();
            std::fs::write(line.join("value"), "1").unwrap();
        }
        dir
    }

    #[test]
    fn sysfs_gpio_reads_and_writes_values() {
        let root = fake_gpio_root();
        let mut gpio = SysfsGpio::open(root.path(), &[17], &[22]).unwrap();

        assert_eq!(gpio.read_digital(17).unwrap(), Level::High);
        gpio.write_digital(22, Level::High).unwrap();
        let value = std::fs::read_to_string(root.path().join("gpio22/value")).unwrap();
        assert_eq!(value, "1");

        assert!(gpio.write_digital(17, Level::High).is_err());
        assert!(gpio.read_digital(22).is_err());
    }

    #[test]
    fn sysfs_gpio_release_drives_outputs_low() {
        let root = fake_gpio_root();
        let mut gpio = SysfsGpio::open(root.path(), &[17], &[22]).unwrap();
        gpio.write_digital(22, Level::High).unwrap();
        gpio.release().unwrap();
        let value = std::fs::read_to_string(root.path().join("gpio22/value")).unwrap();
        assert_eq!(value, "0");
        assert!(gpio.read_digital(17).is_err());
    }

    #[test]
    fn sysfs_gpio_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SysfsGpio::open(dir.path().join("absent"), &[4], &[]).is_err());
    }

    #[test]
    fn iio_humiture_scales_milli_units() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in_temp_input"), "23450\n").unwrap();
        std::fs::write(dir.path().join("in_humidityrelative_input"), "41200\n").unwrap();
        let mut sensor = IioHumiture::open(dir.path()).unwrap();
        let reading = sensor.read().unwrap();
        assert!((reading.temperature_c - 23.45).abs() < 1e-4);
        assert!((reading.humidity_pct - 41.2).abs() < 1e-4);
    }
}
