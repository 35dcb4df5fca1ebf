//! Frame sinks for annotated output.
//!
//! `RawSink` writes packed RGB24 bytes, one frame after another, so the
//! stream can be piped into an external encoder:
//!
//! ```text
//! people_counter -i walk.mp4 | ffmpeg -f rawvideo -pixel_format rgb24 \
//!     -video_size 768x432 -i - http://localhost:3004/fac.ffm
//! ```

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::frame::Frame;

/// Destination for annotated frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
}

impl<K: FrameSink + ?Sized> FrameSink for Box<K> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }
}

/// Raw RGB24 frames to any writer (stdout by default).
pub struct RawSink<W: Write> {
    writer: W,
    frames_written: u64,
}

impl RawSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> RawSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for RawSink<W> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.writer
            .write_all(frame.as_bytes())
            .context("write raw frame")?;
        self.writer.flush().context("flush raw frame")?;
        self.frames_written += 1;
        log::trace!(
            "raw sink: frame {} ({}x{}, {} bytes)",
            frame.sequence,
            frame.width(),
            frame.height(),
            frame.byte_len()
        );
        Ok(())
    }
}

/// Discards frames.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn write_frame(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }
}

/// Saves each frame to one image file; the last frame wins. Used in
/// single-image mode.
pub struct SnapshotSink {
    path: PathBuf,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for SnapshotSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        frame
            .image
            .save(&self.path)
            .with_context(|| format!("failed to write snapshot {}", self.path.display()))?;
        log::info!("snapshot written to {}", self.path.display());
        Ok(())
    }
}
