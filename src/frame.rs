//! Frames flowing through the pipeline.
//!
//! - `Frame`: decoded RGB24 image plus its capture timestamp.
//! - `StreamClock`: monotonic clock that stamps frames relative to stream start.
//!
//! Timestamps are offsets from the start of the stream run, never wall-clock
//! time. Every duration the tracker computes is a difference of two of them.

use image::RgbImage;
use std::time::{Duration, Instant};

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded video frame.
pub struct Frame {
    /// RGB24 pixels. Annotation draws into this in place.
    pub image: RgbImage,
    /// Capture time relative to stream start.
    pub timestamp: Duration,
    /// 1-based position of the frame in the stream.
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp: Duration, sequence: u64) -> Self {
        Self {
            image,
            timestamp,
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw interleaved RGB bytes, row-major, no padding.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Byte length of the raw frame.
    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("timestamp", &self.timestamp)
            .field("sequence", &self.sequence)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// StreamClock
// ----------------------------------------------------------------------------

/// Monotonic clock started when a source is opened.
#[derive(Clone, Copy, Debug)]
pub struct StreamClock {
    started_at: Instant,
}

impl StreamClock {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// Time elapsed since the stream started.
    pub fn now(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for StreamClock {
    fn default() -> Self {
        Self::start()
    }
}
