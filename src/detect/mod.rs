mod backend;
mod backends;

pub use backend::{InferenceBackend, InferenceParams, RawDetection};
pub use backends::{open_backend, StubBackend};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
