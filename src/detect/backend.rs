use anyhow::Result;
use image::{imageops::FilterType, RgbImage};

use crate::detect::result::Detection;

/// Preprocessed frame handed to a detector backend.
///
/// The image is already resized to the backend's declared input size. Layout
/// conversion (HWC to NCHW, channel order, scaling) stays with the backend.
pub struct ModelInput {
    pub image: RgbImage,
}

impl ModelInput {
    /// Resize `frame` to `input_size` when the backend declares one.
    pub fn prepare(frame: &RgbImage, input_size: Option<(u32, u32)>) -> Self {
        let image = match input_size {
            Some((w, h)) if (w, h) != frame.dimensions() => {
                image::imageops::resize(frame, w, h, FilterType::Triangle)
            }
            _ => frame.clone(),
        };
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Detector backend trait.
///
/// A backend owns a loaded model and runs one forward pass per call. Backends
/// run on the inference worker thread, so they must be `Send`.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Input resolution the model expects, if any. `None` means the frame is
    /// passed through at its native size.
    fn input_size(&self) -> Option<(u32, u32)> {
        None
    }

    /// Run detection on a preprocessed frame.
    ///
    /// Returned boxes are normalized to 0..1, so they stay valid for the
    /// original frame size regardless of the resize.
    fn detect(&mut self, input: &ModelInput) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_resizes_to_backend_input() {
        let frame = RgbImage::new(64, 48);
        let input = ModelInput::prepare(&frame, Some((32, 16)));
        assert_eq!((input.width(), input.height()), (32, 16));
    }

    #[test]
    fn prepare_passes_through_without_input_size() {
        let frame = RgbImage::new(64, 48);
        let input = ModelInput::prepare(&frame, None);
        assert_eq!((input.width(), input.height()), (64, 48));
    }
}
