use anyhow::Result;
use image::{Rgb, RgbImage};

use crate::frame::{Frame, StreamClock};

/// Synthetic source for `stub://` inputs.
///
/// Produces a slowly shifting gradient so consecutive frames differ. Endless
/// unless a frame limit is set.
pub(crate) struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
    frame_count: u64,
    clock: StreamClock,
}

impl SyntheticSource {
    pub(crate) fn new(name: &str, width: u32, height: u32, frame_limit: Option<u64>) -> Self {
        log::info!("VideoSource: opened {} (synthetic {}x{})", name, width, height);
        Self {
            name: name.to_string(),
            width,
            height,
            frame_limit,
            frame_count: 0,
            clock: StreamClock::start(),
        }
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        self.frame_count += 1;
        let shift = self.frame_count as u32;
        let image = RgbImage::from_fn(self.width, self.height, |x, y| {
            let v = ((x + y + shift) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        });
        Ok(Some(Frame::new(image, self.clock.now(), self.frame_count)))
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
