use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::InferenceParams;
use crate::process::Thresholds;
use crate::source::EnvironmentPins;

pub const CONFIG_ENV: &str = "EDGE_SENTRY_CONFIG";

const DEFAULT_CAMERA_URL: &str = "stub://camera";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_EXIT_KEY: char = 'q';

const DEFAULT_GPIO: &str = "stub://gpio";
const DEFAULT_HUMITURE: &str = "stub://humiture";
const DEFAULT_LCD_DEVICE: &str = "stub://i2c-1";
const DEFAULT_LCD_ADDR: u16 = 0x27;
const DEFAULT_SOIL_PIN: u8 = 17;
const DEFAULT_LIGHT_PIN: u8 = 27;
const DEFAULT_BUZZER_PIN: u8 = 22;
const DEFAULT_INTERVAL_SECS: u64 = 10;
const DEFAULT_ALERT_PULSE_MS: u64 = 1000;
const DEFAULT_LOG_PATH: &str = "plant_monitor_log.csv";

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    vision: Option<VisionConfigFile>,
    environment: Option<EnvironmentConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VisionConfigFile {
    camera_url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    backend: Option<String>,
    model_path: Option<String>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    exit_key: Option<String>,
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct EnvironmentConfigFile {
    gpio: Option<String>,
    humiture: Option<String>,
    lcd_device: Option<String>,
    lcd_addr: Option<u16>,
    soil_pin: Option<u8>,
    light_pin: Option<u8>,
    buzzer_pin: Option<u8>,
    temp_max: Option<f32>,
    humidity_min: Option<f32>,
    soil_wet_required: Option<bool>,
    light_good_required: Option<bool>,
    interval_secs: Option<u64>,
    alert_pulse_ms: Option<u64>,
    log_path: Option<PathBuf>,
}

/// Everything either loop needs, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub vision: VisionSettings,
    pub environment: EnvironmentSettings,
}

#[derive(Debug, Clone)]
pub struct VisionSettings {
    /// `stub://...` for the synthetic camera, otherwise a V4L2 device path.
    pub camera_url: String,
    pub width: u32,
    pub height: u32,
    pub backend: String,
    pub model_path: Option<String>,
    pub inference: InferenceParams,
    pub exit_key: char,
    /// Where the terminal window drops its PPM snapshot.
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EnvironmentSettings {
    /// `stub://...` for in-memory pins, otherwise the sysfs GPIO root.
    pub gpio: String,
    /// `stub://...` for the synthetic sensor, otherwise an IIO device dir.
    pub humiture: String,
    /// `None` disables the display.
    pub lcd_device: Option<String>,
    pub lcd_addr: u16,
    pub pins: EnvironmentPins,
    pub buzzer_pin: u8,
    pub thresholds: Thresholds,
    pub interval: Duration,
    pub alert_pulse: Duration,
    pub log_path: PathBuf,
}

impl MonitorConfig {
    /// Load from the file named by `EDGE_SENTRY_CONFIG`, if any.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => MonitorConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let vision = file.vision.unwrap_or_default();
        let env = file.environment.unwrap_or_default();
        let inference_defaults = InferenceParams::default();
        let threshold_defaults = Thresholds::default();

        let exit_key = match vision.exit_key {
            Some(key) => parse_key(&key)?,
            None => DEFAULT_EXIT_KEY,
        };

        let vision = VisionSettings {
            camera_url: vision
                .camera_url
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            width: vision.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: vision.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            backend: vision.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: vision.model_path,
            inference: InferenceParams {
                input_size: vision.input_size.unwrap_or(inference_defaults.input_size),
                confidence_threshold: vision
                    .confidence_threshold
                    .unwrap_or(inference_defaults.confidence_threshold),
                iou_threshold: vision
                    .iou_threshold
                    .unwrap_or(inference_defaults.iou_threshold),
            },
            exit_key,
            snapshot_path: vision.snapshot_path,
        };

        let lcd_device = match env.lcd_device {
            Some(device) => parse_optional_device(&device),
            None => Some(DEFAULT_LCD_DEVICE.to_string()),
        };
        let environment = EnvironmentSettings {
            gpio: env.gpio.unwrap_or_else(|| DEFAULT_GPIO.to_string()),
            humiture: env.humiture.unwrap_or_else(|| DEFAULT_HUMITURE.to_string()),
            lcd_device,
            lcd_addr: env.lcd_addr.unwrap_or(DEFAULT_LCD_ADDR),
            pins: EnvironmentPins {
                soil: env.soil_pin.unwrap_or(DEFAULT_SOIL_PIN),
                light: env.light_pin.unwrap_or(DEFAULT_LIGHT_PIN),
            },
            buzzer_pin: env.buzzer_pin.unwrap_or(DEFAULT_BUZZER_PIN),
            thresholds: Thresholds {
                temp_max: env.temp_max.unwrap_or(threshold_defaults.temp_max),
                humidity_min: env.humidity_min.unwrap_or(threshold_defaults.humidity_min),
                soil_wet_required: env
                    .soil_wet_required
                    .unwrap_or(threshold_defaults.soil_wet_required),
                light_good_required: env
                    .light_good_required
                    .unwrap_or(threshold_defaults.light_good_required),
            },
            interval: Duration::from_secs(env.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS)),
            alert_pulse: Duration::from_millis(
                env.alert_pulse_ms.unwrap_or(DEFAULT_ALERT_PULSE_MS),
            ),
            log_path: env
                .log_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH)),
        };

        Ok(Self {
            vision,
            environment,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_string("EDGE_SENTRY_CAMERA_URL") {
            self.vision.camera_url = url;
        }
        if let Some(backend) = env_string("EDGE_SENTRY_BACKEND") {
            self.vision.backend = backend;
        }
        if let Some(path) = env_string("EDGE_SENTRY_MODEL_PATH") {
            self.vision.model_path = Some(path);
        }
        if let Some(threshold) = env_string("EDGE_SENTRY_CONFIDENCE") {
            self.vision.inference.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("EDGE_SENTRY_CONFIDENCE must be a number"))?;
        }
        if let Some(key) = env_string("EDGE_SENTRY_EXIT_KEY") {
            self.vision.exit_key = parse_key(&key)?;
        }
        if let Some(path) = env_string("EDGE_SENTRY_SNAPSHOT_PATH") {
            self.vision.snapshot_path = Some(PathBuf::from(path));
        }
        if let Some(gpio) = env_string("EDGE_SENTRY_GPIO") {
            self.environment.gpio = gpio;
        }
        if let Some(humiture) = env_string("EDGE_SENTRY_HUMITURE") {
            self.environment.humiture = humiture;
        }
        if let Ok(device) = std::env::var("EDGE_SENTRY_LCD_DEVICE") {
            self.environment.lcd_device = parse_optional_device(&device);
        }
        if let Some(path) = env_string("EDGE_SENTRY_LOG_PATH") {
            self.environment.log_path = PathBuf::from(path);
        }
        if let Some(interval) = env_string("EDGE_SENTRY_INTERVAL_SECS") {
            let seconds: u64 = interval.parse().map_err(|_| {
                anyhow!("EDGE_SENTRY_INTERVAL_SECS must be an integer number of seconds")
            })?;
            self.environment.interval = Duration::from_secs(seconds);
        }
        if let Some(temp) = env_string("EDGE_SENTRY_TEMP_MAX") {
            self.environment.thresholds.temp_max = temp
                .parse()
                .map_err(|_| anyhow!("EDGE_SENTRY_TEMP_MAX must be a number"))?;
        }
        if let Some(humidity) = env_string("EDGE_SENTRY_HUMIDITY_MIN") {
            self.environment.thresholds.humidity_min = humidity
                .parse()
                .map_err(|_| anyhow!("EDGE_SENTRY_HUMIDITY_MIN must be a number"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let vision = &self.vision;
        if vision.width == 0 || vision.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero (got {}x{})",
                vision.width,
                vision.height
            ));
        }
        if vision.inference.input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        for (name, value) in [
            ("confidence_threshold", vision.inference.confidence_threshold),
            ("iou_threshold", vision.inference.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1] (got {})", name, value));
            }
        }

        let env = &self.environment;
        let pins = [
            ("soil", env.pins.soil),
            ("light", env.pins.light),
            ("buzzer", env.buzzer_pin),
        ];
        for (i, (name, pin)) in pins.iter().enumerate() {
            if let Some((other, _)) = pins[i + 1..].iter().find(|(_, p)| p == pin) {
                return Err(anyhow!("{} and {} pins both use GPIO {}", name, other, pin));
            }
        }
        if !env.thresholds.temp_max.is_finite() || !env.thresholds.humidity_min.is_finite() {
            return Err(anyhow!("thresholds must be finite numbers"));
        }
        if env.log_path.as_os_str().is_empty() {
            return Err(anyhow!("log path must not be empty"));
        }
        Ok(())
    }
}

/// `stub://` collaborators are synthetic; anything else names a device.
pub fn is_stub(url: &str) -> bool {
    url.starts_with("stub://")
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("parse JSON config {}", path.display()))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_key(raw: &str) -> Result<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Ok(key),
        _ => Err(anyhow!("exit key must be a single character (got {:?})", raw)),
    }
}

fn parse_optional_device(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    }
}
