//! plant_monitor - plant environment monitoring loop
//!
//! Every interval: read humiture, soil moisture and light, log the reading,
//! show it on the display and sound the buzzer when a threshold is crossed.
//! Runs until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use edge_sentry::config::{is_stub, EnvironmentSettings, MonitorConfig};
use edge_sentry::hal::{
    Gpio, HumitureSensor, I2cBus, Level, MemoryGpio, MemoryI2c, SyntheticHumiture,
};
use edge_sentry::sink::{AlertSink, ConsoleSink, DisplaySink, LogSink};
use edge_sentry::ui::{StageReporter, UiMode};
use edge_sentry::{
    Cadence, EnvironmentSource, LoopController, LoopError, Pipeline, ShutdownSignal, SinkSet,
    ThresholdProcessor,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "EDGE_SENTRY_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many readings.
    #[arg(long)]
    iterations: Option<u64>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let reporter = StageReporter::new(
        args.ui.parse::<UiMode>()?,
        std::io::stderr().is_terminal(),
        std::io::stdout().is_terminal(),
    );
    let cfg = reporter.run("Load configuration", || {
        MonitorConfig::load_from(args.config.as_deref())
    })?;
    let env = cfg.environment;

    let shutdown = ShutdownSignal::new();
    shutdown.install_ctrlc()?;

    let mut controller = LoopController::new(Cadence::Every(env.interval), shutdown)
        .with_max_iterations(args.iterations);
    let summary = controller.run(|session| {
        let gpio = reporter.run("Open GPIO", || {
            session.acquire("gpio", || open_gpio(&env))
        })?;
        let humiture = reporter.run("Open humiture sensor", || {
            session.acquire("humiture", || open_humiture(&env))
        })?;
        let display = match env.lcd_device.as_deref() {
            Some(device) => Some(reporter.run("Open display", || {
                session.acquire("display", || open_i2c(device))
            })?),
            None => None,
        };
        let log_sink = reporter
            .run("Open reading log", || LogSink::open(&env.log_path))
            .map_err(|cause| LoopError::acquisition("log", cause))?;

        log::info!(
            "environment loop: every {:?}, soil pin {}, light pin {}, buzzer pin {}, log {}",
            env.interval,
            env.pins.soil,
            env.pins.light,
            env.buzzer_pin,
            env.log_path.display()
        );
        let mut sinks = SinkSet::new().with(ConsoleSink::new()).with(log_sink);
        if let Some(bus) = display {
            sinks.push(DisplaySink::new(bus, env.lcd_addr));
        }
        sinks.push(AlertSink::new(gpio.clone(), env.buzzer_pin, env.alert_pulse));

        Ok(Pipeline::new(
            EnvironmentSource::new(humiture, gpio, env.pins),
            ThresholdProcessor::new(env.thresholds),
            sinks,
        ))
    })?;

    log::info!(
        "plant_monitor exiting after {} reading(s), {} sink failure(s)",
        summary.iterations,
        summary.sink_failures
    );
    Ok(())
}

fn open_gpio(env: &EnvironmentSettings) -> Result<Box<dyn Gpio>> {
    if is_stub(&env.gpio) {
        // healthy plant: wet soil, enough light
        return Ok(Box::new(
            MemoryGpio::new()
                .with_input(env.pins.soil, Level::High)
                .with_input(env.pins.light, Level::High),
        ));
    }
    open_sysfs_gpio(env)
}

#[cfg(target_os = "linux")]
fn open_sysfs_gpio(env: &EnvironmentSettings) -> Result<Box<dyn Gpio>> {
    Ok(Box::new(edge_sentry::hal::linux::SysfsGpio::open(
        &env.gpio,
        &[env.pins.soil, env.pins.light],
        &[env.buzzer_pin],
    )?))
}

#[cfg(not(target_os = "linux"))]
fn open_sysfs_gpio(env: &EnvironmentSettings) -> Result<Box<dyn Gpio>> {
    Err(anyhow::anyhow!("GPIO root {} is only supported on Linux", env.gpio))
}

fn open_humiture(env: &EnvironmentSettings) -> Result<Box<dyn HumitureSensor>> {
    if is_stub(&env.humiture) {
        return Ok(Box::new(SyntheticHumiture::seeded(rand::random())));
    }
    open_iio_humiture(&env.humiture)
}

#[cfg(target_os = "linux")]
fn open_iio_humiture(dir: &str) -> Result<Box<dyn HumitureSensor>> {
    Ok(Box::new(edge_sentry::hal::linux::IioHumiture::open(dir)?))
}

#[cfg(not(target_os = "linux"))]
fn open_iio_humiture(dir: &str) -> Result<Box<dyn HumitureSensor>> {
    Err(anyhow::anyhow!("IIO humiture device {} is only supported on Linux", dir))
}

fn open_i2c(device: &str) -> Result<Box<dyn I2cBus>> {
    if is_stub(device) {
        return Ok(Box::new(MemoryI2c::new()));
    }
    open_i2c_dev(device)
}

#[cfg(target_os = "linux")]
fn open_i2c_dev(device: &str) -> Result<Box<dyn I2cBus>> {
    Ok(Box::new(edge_sentry::hal::linux::I2cDevBus::open_path(device)?))
}

#[cfg(not(target_os = "linux"))]
fn open_i2c_dev(device: &str) -> Result<Box<dyn I2cBus>> {
    Err(anyhow::anyhow!("I2C device {} is only supported on Linux", device))
}
