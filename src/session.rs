//! Hardware resource session.
//!
//! A `Session` owns every hardware handle a loop needs (camera, GPIO lines,
//! I2C bus, display window) for the lifetime of the run:
//! - Handles are opened one by one through a `SessionBuilder`
//! - A failed open rolls back everything opened before it
//! - Release closes handles in reverse acquisition order and never fails
//! - Dropping a `Session` releases it, so every exit path tears down
//!
//! Sources and sinks borrow handles as `Shared<T>`; the session keeps the
//! teardown obligation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::LoopError;

/// Handle shared between the session and the loop stages that drive it.
pub type Shared<T> = Rc<RefCell<T>>;

/// A hardware handle that must be closed explicitly.
pub trait Resource {
    /// Close the underlying handle. Called at most once by the session.
    fn release(&mut self) -> anyhow::Result<()>;
}

struct Handle {
    name: &'static str,
    resource: Rc<RefCell<dyn Resource>>,
}

/// Outcome of a release pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Handles closed cleanly, in the order they were closed.
    pub released: Vec<&'static str>,
    /// Handles that reported an error while closing.
    pub failed: Vec<(&'static str, String)>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Opens handles in order; rolls back on failure or when dropped unfinished.
#[derive(Default)]
pub struct SessionBuilder {
    handles: Vec<Handle>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open one handle.
    ///
    /// On failure every handle acquired so far is released (reverse order)
    /// before the `Acquisition` error is returned.
    pub fn acquire<T, F>(&mut self, name: &'static str, open: F) -> Result<Shared<T>, LoopError>
    where
        T: Resource + 'static,
        F: FnOnce() -> anyhow::Result<T>,
    {
        match open() {
            Ok(resource) => {
                let shared = Rc::new(RefCell::new(resource));
                let handle: Rc<RefCell<dyn Resource>> = shared.clone();
                self.handles.push(Handle {
                    name,
                    resource: handle,
                });
                log::debug!("session: acquired {}", name);
                Ok(shared)
            }
            Err(cause) => {
                log::error!("session: failed to acquire {}: {:#}", name, cause);
                let report = release_all(&mut self.handles);
                if !report.released.is_empty() {
                    log::info!(
                        "session: rolled back {} handle(s): {}",
                        report.released.len(),
                        report.released.join(", ")
                    );
                }
                Err(LoopError::acquisition(name, cause))
            }
        }
    }

    /// Number of handles currently held.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Hand the acquired handles over to a live session.
    pub fn finish(mut self) -> Session {
        Session {
            handles: std::mem::take(&mut self.handles),
            released: false,
        }
    }
}

impl Drop for SessionBuilder {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            log::warn!(
                "session: builder dropped with {} open handle(s); rolling back",
                self.handles.len()
            );
            release_all(&mut self.handles);
        }
    }
}

/// The bundle of open hardware handles owned for a loop's lifetime.
pub struct Session {
    handles: Vec<Handle>,
    released: bool,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Names of the handles still open, in acquisition order.
    pub fn resources(&self) -> Vec<&'static str> {
        self.handles.iter().map(|h| h.name).collect()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Close every handle in reverse acquisition order.
    ///
    /// Idempotent: a second call closes nothing and returns an empty report.
    pub fn release(&mut self) -> ReleaseReport {
        if self.released {
            log::debug!("session: already released");
            return ReleaseReport::default();
        }
        self.released = true;
        let report = release_all(&mut self.handles);
        if report.is_clean() {
            log::info!("session: released {} handle(s)", report.released.len());
        } else {
            log::warn!(
                "session: released {} handle(s), {} failed to close",
                report.released.len(),
                report.failed.len()
            );
        }
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

fn release_all(handles: &mut Vec<Handle>) -> ReleaseReport {
    let mut report = ReleaseReport::default();
    while let Some(handle) = handles.pop() {
        let outcome = match handle.resource.try_borrow_mut() {
            Ok(mut resource) => resource.release(),
            Err(_) => Err(anyhow::anyhow!("handle is still borrowed")),
        };
        match outcome {
            Ok(()) => report.released.push(handle.name),
            Err(err) => {
                log::warn!("session: failed to close {}: {:#}", handle.name, err);
                report.failed.push((handle.name, format!("{:#}", err)));
            }
        }
    }
    report
}
