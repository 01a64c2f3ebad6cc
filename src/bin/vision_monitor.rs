//! vision_monitor - camera object detection loop
//!
//! Captures frames, runs the configured detector, draws the detections and
//! presents each frame until the exit key or Ctrl-C.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use edge_sentry::config::{is_stub, MonitorConfig, VisionSettings};
use edge_sentry::detect::open_backend;
use edge_sentry::hal::{Camera, FrameWindow, HeadlessWindow, SyntheticCamera, TerminalWindow};
use edge_sentry::sink::{ConsoleSink, VisualSink};
use edge_sentry::ui::{StageReporter, UiMode};
use edge_sentry::{
    Cadence, DetectionProcessor, LoopController, LoopError, Pipeline, ShutdownSignal, SinkSet,
    VisionSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "EDGE_SENTRY_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    iterations: Option<u64>,
    /// Keep frames in memory instead of presenting them.
    #[arg(long)]
    headless: bool,
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
    let vision = cfg.vision;

    let shutdown = ShutdownSignal::new();
    shutdown.install_ctrlc()?;

    let mut controller = LoopController::new(Cadence::Immediate, shutdown.clone())
        .with_max_iterations(args.iterations);
    let summary = controller.run(|session| {
        let camera = reporter.run("Open camera", || {
            session.acquire("camera", || open_camera(&vision))
        })?;
        let window = reporter.run("Open window", || {
            session.acquire("window", || open_window(&vision, args.headless))
        })?;
        let backend = reporter
            .run("Load detector", || {
                let mut backend = open_backend(
                    &vision.backend,
                    vision.model_path.as_deref(),
                    vision.inference.input_size,
                )?;
                backend.warm_up()?;
                Ok::<_, anyhow::Error>(backend)
            })
            .map_err(|cause| LoopError::acquisition("detector", cause))?;

        log::info!(
            "vision loop: camera={} {}x{}, backend={}, exit key '{}'",
            vision.camera_url,
            vision.width,
            vision.height,
            backend.name(),
            vision.exit_key
        );
        let sinks = SinkSet::new()
            .with(VisualSink::new(window, vision.exit_key, shutdown.clone()))
            .with(ConsoleSink::new());
        Ok(Pipeline::new(
            VisionSource::new(camera),
            DetectionProcessor::new(backend, vision.inference),
            sinks,
        ))
    })?;

    log::info!(
        "vision_monitor exiting after {} frame(s), {} degraded",
        summary.iterations,
        summary.degraded
    );
    Ok(())
}

fn open_camera(vision: &VisionSettings) -> Result<Box<dyn Camera>> {
    let mut camera: Box<dyn Camera> = if is_stub(&vision.camera_url) {
        Box::new(SyntheticCamera::new(vision.camera_url.clone()))
    } else {
        open_device_camera(&vision.camera_url)?
    };
    camera.configure(vision.width, vision.height)?;
    camera.start()?;
    Ok(camera)
}

#[cfg(feature = "ingest-v4l2")]
fn open_device_camera(path: &str) -> Result<Box<dyn Camera>> {
    Ok(Box::new(edge_sentry::hal::v4l2::V4l2Camera::new(path)))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device_camera(path: &str) -> Result<Box<dyn Camera>> {
    Err(anyhow::anyhow!(
        "camera {} needs the ingest-v4l2 feature (or use a stub:// url)",
        path
    ))
}

fn open_window(vision: &VisionSettings, headless: bool) -> Result<Box<dyn FrameWindow>> {
    if headless {
        return Ok(Box::new(HeadlessWindow::new()));
    }
    Ok(Box::new(TerminalWindow::open(
        "Edge Sentry",
        vision.snapshot_path.clone(),
    )?))
}
