use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::{Frame, StreamClock};

/// Single still image: yields one frame, then end of stream.
pub(crate) struct StillImageSource {
    path: PathBuf,
    pending: Option<image::RgbImage>,
    frame_count: u64,
    clock: StreamClock,
}

impl StillImageSource {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .to_rgb8();
        log::info!(
            "VideoSource: opened {} (still image {}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self {
            path: path.to_path_buf(),
            pending: Some(image),
            frame_count: 0,
            clock: StreamClock::start(),
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(image) = self.pending.take() else {
            return Ok(None);
        };
        self.frame_count += 1;
        Ok(Some(Frame::new(image, self.clock.now(), self.frame_count)))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
