//! Detection filtering.
//!
//! Reduces a raw per-frame detection list to the detections strictly above the
//! probability threshold and rescales their boxes to pixel coordinates.
//! Everything at or below the threshold is dropped here and never reaches the
//! tracker.

use std::time::Duration;

use super::result::{Detection, FilteredDetection, PixelBox};

/// Keep detections whose confidence strictly exceeds `threshold`.
///
/// Order is preserved. Box coordinates are clamped to 0..1, scaled by the
/// frame size and truncated toward zero.
pub fn filter_detections(
    detections: &[Detection],
    threshold: f32,
    width: u32,
    height: u32,
) -> Vec<FilteredDetection> {
    let w = width as f32;
    let h = height as f32;
    detections
        .iter()
        .filter(|det| det.confidence > threshold)
        .map(|det| FilteredDetection {
            label: det.label,
            confidence: det.confidence,
            bbox: PixelBox {
                xmin: to_pixel(det.xmin, w),
                ymin: to_pixel(det.ymin, h),
                xmax: to_pixel(det.xmax, w),
                ymax: to_pixel(det.ymax, h),
            },
        })
        .collect()
}

/// Raw model output is not trusted to stay in 0..1.
fn to_pixel(normalized: f32, dim: f32) -> i32 {
    (normalized.clamp(0.0, 1.0) * dim) as i32
}

/// What the tracker sees of one processed frame.
///
/// The count is derived from the box list, so `count() == boxes().len()`
/// always holds.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameObservation {
    timestamp: Duration,
    boxes: Vec<PixelBox>,
}

impl FrameObservation {
    pub fn new(timestamp: Duration, detections: &[FilteredDetection]) -> Self {
        Self {
            timestamp,
            boxes: detections.iter().map(|det| det.bbox).collect(),
        }
    }

    /// Observation with `count` placeholder boxes. Used to replay recorded counts.
    pub fn from_count(timestamp: Duration, count: usize) -> Self {
        let empty = PixelBox {
            xmin: 0,
            ymin: 0,
            xmax: 0,
            ymax: 0,
        };
        Self {
            timestamp,
            boxes: vec![empty; count],
        }
    }

    pub fn count(&self) -> usize {
        self.boxes.len()
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn boxes(&self) -> &[PixelBox] {
        &self.boxes
    }
}
