//! Output channels.
//!
//! Every decision is broadcast to an ordered set of sinks. Sinks are
//! independent: a failing sink is logged and skipped, the remaining sinks
//! still see the decision.

mod alert;
mod console;
mod csv_log;
mod display;
mod visual;

pub use alert::AlertSink;
pub use console::ConsoleSink;
pub use csv_log::{LogRecord, LogSink};
pub use display::{lcd_text, DisplaySink};
pub use visual::VisualSink;

use crate::error::LoopError;

/// Consumes the decision derived from an observation.
pub trait Sink<O, D> {
    fn name(&self) -> &'static str;

    fn consume(&mut self, observation: &O, decision: &D) -> anyhow::Result<()>;
}

/// Ordered, failure-isolated collection of sinks.
pub struct SinkSet<O, D> {
    sinks: Vec<Box<dyn Sink<O, D>>>,
}

impl<O, D> SinkSet<O, D> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: impl Sink<O, D> + 'static) -> Self {
        self.push(sink);
        self
    }

    pub fn push(&mut self, sink: impl Sink<O, D> + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Hand the decision to every sink in order. Returns the failures.
    pub fn dispatch(&mut self, observation: &O, decision: &D) -> Vec<LoopError> {
        let mut failures = Vec::new();
        for sink in &mut self.sinks {
            if let Err(cause) = sink.consume(observation, decision) {
                let err = LoopError::sink(sink.name(), cause);
                log::warn!("{}", err);
                failures.push(err);
            }
        }
        failures
    }
}

impl<O, D> Default for SinkSet<O, D> {
    fn default() -> Self {
        Self::new()
    }
}
