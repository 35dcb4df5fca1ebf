//! Detection: backends, the inference worker and the confidence filter.

mod backend;
mod backends;
mod filter;
mod result;
mod worker;

use anyhow::{anyhow, Result};

pub use backend::{DetectorBackend, ModelInput};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use filter::{filter_detections, FrameObservation};
pub use result::{Detection, FilteredDetection, InferenceOutput, PixelBox};
pub use worker::InferenceWorker;

use crate::config::ModelSettings;

/// Build the backend named in `settings`.
pub fn open_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        "tract" => open_tract_backend(settings),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}

#[cfg(feature = "backend-tract")]
fn open_tract_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    let path = settings
        .path
        .as_ref()
        .ok_or_else(|| anyhow!("the tract backend requires a model path"))?;
    let backend = TractBackend::new(path, settings.input_width, settings.input_height)?
        .with_bgr(settings.bgr)
        .with_scale(settings.scale);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn open_tract_backend(_settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!("the tract backend requires the backend-tract feature"))
}
