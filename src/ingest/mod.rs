//! Frame ingestion sources.
//!
//! - Synthetic frames (`stub://name`), for demos and tests
//! - Still images (`.jpg`, `.jpeg`, `.png`, `.bmp`), one frame then end of stream
//! - Video files, devices and stream URLs through FFmpeg (feature: ingest-ffmpeg)
//!
//! Sources stamp each frame with its capture time relative to the moment the
//! source was opened. Opening is the only fatal step: a source that cannot be
//! opened fails before any tracking state exists.

#[cfg(feature = "ingest-ffmpeg")]
mod ffmpeg;
mod still;
mod synthetic;
pub mod video;

use anyhow::Result;

use crate::frame::Frame;

pub use video::{SourceKind, VideoSource};

/// Source of successive frames.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Human-readable source description for logs.
    fn describe(&self) -> String;

    /// Frames produced so far.
    fn frames_captured(&self) -> u64;
}
