//! Startup stage reporting on stderr.
//!
//! Each acquisition stage shows a spinner on a terminal, or a plain
//! `==> name` line otherwise, and reports its outcome and duration when the
//! stage guard goes out of scope.

use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl FromStr for UiMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw {
            "auto" => Ok(UiMode::Auto),
            "plain" => Ok(UiMode::Plain),
            "pretty" => Ok(UiMode::Pretty),
            other => Err(anyhow!("unknown ui mode {:?} (auto|plain|pretty)", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StageReporter {
    spinners: bool,
}

impl StageReporter {
    /// Spinners need a terminal on stderr; `Auto` also backs off when
    /// stdout is redirected, so logs captured to a file stay readable.
    pub fn new(mode: UiMode, stderr_is_tty: bool, stdout_is_tty: bool) -> Self {
        let spinners = stderr_is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => stdout_is_tty,
                UiMode::Plain => false,
            };
        Self { spinners }
    }

    pub fn uses_spinners(&self) -> bool {
        self.spinners
    }

    pub fn stage(&self, name: &str) -> Stage {
        let spinner = if self.spinners {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        Stage {
            name: name.to_string(),
            started: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Run `work` as a named stage, marking the stage failed on error.
    pub fn run<T, E>(&self, name: &str, work: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let mut stage = self.stage(name);
        let result = work();
        if result.is_err() {
            stage.fail();
        }
        result
    }
}

pub struct Stage {
    name: String,
    started: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl Stage {
    pub fn fail(&mut self) {
        self.failed = true;
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!(
            "{} {} ({})",
            mark,
            self.name,
            format_elapsed(self.started.elapsed())
        );
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}
