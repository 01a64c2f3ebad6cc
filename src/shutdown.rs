use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

/// Cooperative stop request.
///
/// Setting it never interrupts work in progress; the controller looks at it
/// between iterations. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Route Ctrl-C / SIGTERM / SIGHUP to this signal. Can only be installed
    /// once per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let requested = self.requested.clone();
        ctrlc::set_handler(move || {
            requested.store(true, Ordering::SeqCst);
        })
        .context("error setting Ctrl-C handler")
    }
}
