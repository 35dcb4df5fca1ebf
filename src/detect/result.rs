/// One raw model output for a frame.
///
/// Box coordinates are normalized to 0..1 relative to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Model class label.
    pub label: u32,
    /// Confidence in 0..1.
    pub confidence: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl Detection {
    pub fn new(label: u32, confidence: f32, xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            label,
            confidence,
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// Axis-aligned box in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl PixelBox {
    pub fn width(&self) -> i32 {
        self.xmax.saturating_sub(self.xmin)
    }

    pub fn height(&self) -> i32 {
        self.ymax.saturating_sub(self.ymin)
    }
}

/// A detection that passed the confidence threshold, boxed in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilteredDetection {
    pub label: u32,
    pub confidence: f32,
    pub bbox: PixelBox,
}

/// Detections returned by one inference request, with the time it took.
#[derive(Clone, Debug, Default)]
pub struct InferenceOutput {
    pub detections: Vec<Detection>,
    pub latency: std::time::Duration,
}
