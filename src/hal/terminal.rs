//! Frame window for headless boards.
//!
//! There is no GUI toolkit on the target, so "showing" a frame means writing
//! it as a binary PPM snapshot (when a path is configured) that any viewer
//! can follow. Keys come from the controlling terminal: typing the exit key
//! followed by Enter stops the vision loop.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::FrameWindow;
use crate::observation::VisualFrame;
use crate::session::Resource;

pub struct TerminalWindow {
    title: String,
    snapshot: Option<PathBuf>,
    shown: u64,
}

impl TerminalWindow {
    pub fn open(title: impl Into<String>, snapshot: Option<PathBuf>) -> Result<Self> {
        let title = title.into();
        match &snapshot {
            Some(path) => log::info!("{}: writing frames to {}", title, path.display()),
            None => log::info!("{}: no snapshot path, frames are not persisted", title),
        }
        Ok(Self {
            title,
            snapshot,
            shown: 0,
        })
    }

    fn write_snapshot(&self, frame: &VisualFrame, path: &PathBuf) -> Result<()> {
        // Write beside the target and rename so viewers never see half a frame.
        let tmp = path.with_extension("ppm.tmp");
        let mut file = std::fs::File::create(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        write!(file, "P6\n{} {}\n255\n", frame.width, frame.height)?;
        file.write_all(&frame.pixels)?;
        file.flush()?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }
}

impl FrameWindow for TerminalWindow {
    fn show(&mut self, frame: &VisualFrame) -> Result<()> {
        self.shown += 1;
        if let Some(path) = &self.snapshot {
            self.write_snapshot(frame, path)?;
        }
        log::debug!(
            "{}: frame #{} {}x{}",
            self.title,
            self.shown,
            frame.width,
            frame.height
        );
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        read_stdin_key()
    }
}

impl Resource for TerminalWindow {
    fn release(&mut self) -> Result<()> {
        log::info!("{}: closed after {} frame(s)", self.title, self.shown);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn read_stdin_key() -> Option<char> {
    let mut fds = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: one valid pollfd, zero timeout.
    let ready = unsafe { libc::poll(&mut fds, 1, 0) };
    if ready <= 0 || fds.revents & libc::POLLIN == 0 {
        return None;
    }
    let mut byte = 0u8;
    // SAFETY: reading one byte into a stack buffer.
    let n = unsafe { libc::read(libc::STDIN_FILENO, (&mut byte as *mut u8).cast(), 1) };
    if n == 1 {
        Some(byte as char)
    } else {
        None
    }
}

#[cfg(not(target_os = "linux"))]
fn read_stdin_key() -> Option<char> {
    None
}
