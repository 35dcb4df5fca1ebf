#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorBackend, ModelInput};
use crate::detect::result::Detection;

/// Values per detection row in an SSD-style output: image_id, label, conf,
/// xmin, ymin, xmax, ymax.
const SSD_ROW_LEN: usize = 7;

/// Tract-based backend for SSD-style ONNX person detectors.
///
/// The model takes a `1x3xHxW` f32 tensor and produces `1x1xNx7` rows. Rows
/// with a negative image id terminate the list.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    bgr: bool,
    scale: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            bgr: true,
            scale: 1.0,
        })
    }

    /// Feed channels in BGR order (the default, as most SSD exports expect).
    pub fn with_bgr(mut self, bgr: bool) -> Self {
        self.bgr = bgr;
        self
    }

    /// Multiply raw 0..255 pixel values by `scale` before inference.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    fn build_input(&self, input: &ModelInput) -> Result<Tensor> {
        if input.width() != self.width || input.height() != self.height {
            return Err(anyhow!(
                "input size {}x{} does not match model input {}x{}",
                input.width(),
                input.height(),
                self.width,
                self.height
            ));
        }

        let pixels = input.image.as_raw();
        let width = self.width as usize;
        let bgr = self.bgr;
        let scale = self.scale;
        let tensor = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, width),
            |(_, channel, y, x)| {
                let channel = if bgr { 2 - channel } else { channel };
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 * scale
            },
        );

        Ok(tensor.into_tensor())
    }

    fn extract_detections(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values = output
            .as_slice::<f32>()
            .context("model output tensor was not f32")?;
        if values.len() % SSD_ROW_LEN != 0 {
            return Err(anyhow!(
                "model output length {} is not a multiple of {}",
                values.len(),
                SSD_ROW_LEN
            ));
        }

        let detections = values
            .chunks_exact(SSD_ROW_LEN)
            .take_while(|row| row[0] >= 0.0)
            .map(|row| Detection::new(row[1] as u32, row[2], row[3], row[4], row[5], row[6]))
            .collect();
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn detect(&mut self, input: &ModelInput) -> Result<Vec<Detection>> {
        let tensor = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        self.extract_detections(outputs)
    }
}
