use thiserror::Error;

/// Errors raised by the sample/process/act loop.
///
/// Only `Acquisition` and `Config` are allowed to abort a run. Everything
/// else is contained to the iteration (or the sink) that produced it.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("failed to acquire {resource}: {cause:#}")]
    Acquisition {
        resource: &'static str,
        #[source]
        cause: anyhow::Error,
    },

    #[error("frame capture failed: {0:#}")]
    Capture(#[source] anyhow::Error),

    #[error("sensor read failed on {channel}: {cause:#}")]
    SensorRead {
        channel: &'static str,
        #[source]
        cause: anyhow::Error,
    },

    #[error("inference failed: {0:#}")]
    Inference(#[source] anyhow::Error),

    #[error("sink {sink} failed: {cause:#}")]
    Sink {
        sink: &'static str,
        #[source]
        cause: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LoopError {
    pub fn acquisition(resource: &'static str, cause: anyhow::Error) -> Self {
        Self::Acquisition { resource, cause }
    }

    pub fn sink(sink: &'static str, cause: anyhow::Error) -> Self {
        Self::Sink { sink, cause }
    }

    /// Steady-state errors degrade a single iteration; the loop keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Capture(_) | Self::SensorRead { .. } | Self::Inference(_) | Self::Sink { .. }
        )
    }
}
