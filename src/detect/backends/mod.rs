pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::{anyhow, Result};

use super::InferenceBackend;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

/// Build the backend named in configuration.
///
/// `stub` needs no model. `tract` loads the ONNX file at `model_path` with a
/// fixed `input_size` square input.
pub fn open_backend(
    name: &str,
    model_path: Option<&str>,
    input_size: u32,
) -> Result<Box<dyn InferenceBackend>> {
    match name {
        "stub" => Ok(Box::new(StubBackend::new())),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let path = model_path.ok_or_else(|| anyhow!("tract backend needs a model path"))?;
            Ok(Box::new(TractBackend::new(path, input_size)?))
        }
        other => {
            let _ = (model_path, input_size);
            Err(anyhow!(
                "unknown inference backend '{}' (available: {})",
                other,
                available().join(", ")
            ))
        }
    }
}

fn available() -> Vec<&'static str> {
    let mut names = vec!["stub"];
    if cfg!(feature = "backend-tract") {
        names.push("tract");
    }
    names
}
