//! Input selection.
//!
//! `VideoSource` picks a backend from the configured input string:
//! - `stub://name` → synthetic frames
//! - a path ending in `.jpg`, `.jpeg`, `.png` or `.bmp` → single still image
//! - `CAM` → the default capture device (`/dev/video0`) through FFmpeg
//! - anything else → FFmpeg (local files must exist)

use anyhow::{anyhow, Result};
use std::path::Path;

#[cfg(feature = "ingest-ffmpeg")]
use super::ffmpeg::FfmpegSource;
use super::still::StillImageSource;
use super::synthetic::SyntheticSource;
use super::FrameSource;
use crate::config::SourceSettings;
use crate::frame::Frame;

const STILL_IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
const CAMERA_ALIAS: &str = "CAM";
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

/// Kind of input a configured source string resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    StillImage,
    Stream(String),
}

impl SourceKind {
    pub fn classify(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("stub://") {
            return Self::Synthetic;
        }
        if input == CAMERA_ALIAS {
            return Self::Stream(DEFAULT_CAMERA_DEVICE.to_string());
        }
        let is_still = Path::new(input)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                STILL_IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_still && !input.contains("://") {
            Self::StillImage
        } else {
            Self::Stream(input.to_string())
        }
    }
}

pub struct VideoSource {
    backend: VideoBackend,
}

enum VideoBackend {
    Synthetic(SyntheticSource),
    Still(StillImageSource),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(Box<FfmpegSource>),
}

impl VideoSource {
    /// Open the configured input. Failure here is fatal to the run.
    pub fn open(settings: &SourceSettings) -> Result<Self> {
        let input = settings.input.trim();
        let backend = match SourceKind::classify(input) {
            SourceKind::Synthetic => VideoBackend::Synthetic(SyntheticSource::new(
                input,
                settings.width,
                settings.height,
                None,
            )),
            SourceKind::StillImage => VideoBackend::Still(StillImageSource::open(Path::new(input))?),
            SourceKind::Stream(location) => open_stream(&location)?,
        };
        Ok(Self { backend })
    }

    /// Synthetic source that ends after `frame_limit` frames.
    pub fn synthetic(name: &str, width: u32, height: u32, frame_limit: Option<u64>) -> Self {
        Self {
            backend: VideoBackend::Synthetic(SyntheticSource::new(
                name,
                width,
                height,
                frame_limit,
            )),
        }
    }

    /// True when the input is a single still image.
    pub fn is_still_image(&self) -> bool {
        matches!(self.backend, VideoBackend::Still(_))
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            VideoBackend::Synthetic(source) => source.next_frame(),
            VideoBackend::Still(source) => source.next_frame(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            VideoBackend::Synthetic(source) => source.name().to_string(),
            VideoBackend::Still(source) => source.path().display().to_string(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.location().to_string(),
        }
    }

    fn frames_captured(&self) -> u64 {
        match &self.backend {
            VideoBackend::Synthetic(source) => source.frames_captured(),
            VideoBackend::Still(source) => source.frames_captured(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.frames_captured(),
        }
    }
}

fn open_stream(location: &str) -> Result<VideoBackend> {
    if !location.contains("://") && !Path::new(location).exists() {
        return Err(anyhow!("input file {} does not exist", location));
    }
    #[cfg(feature = "ingest-ffmpeg")]
    {
        Ok(VideoBackend::Ffmpeg(Box::new(FfmpegSource::open(location)?)))
    }
    #[cfg(not(feature = "ingest-ffmpeg"))]
    {
        Err(anyhow!(
            "video input {} requires the ingest-ffmpeg feature",
            location
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(input: &str) -> SourceSettings {
        SourceSettings {
            input: input.to_string(),
            width: 32,
            height: 24,
            target_fps: 10,
        }
    }

    #[test]
    fn classifies_inputs() {
        assert_eq!(SourceKind::classify("stub://door"), SourceKind::Synthetic);
        assert_eq!(SourceKind::classify("shot.JPG"), SourceKind::StillImage);
        assert_eq!(SourceKind::classify("frame.bmp"), SourceKind::StillImage);
        assert_eq!(
            SourceKind::classify("CAM"),
            SourceKind::Stream("/dev/video0".to_string())
        );
        assert_eq!(
            SourceKind::classify("rtsp://cam/stream.jpg"),
            SourceKind::Stream("rtsp://cam/stream.jpg".to_string())
        );
        assert_eq!(
            SourceKind::classify("walk.mp4"),
            SourceKind::Stream("walk.mp4".to_string())
        );
    }

    #[test]
    fn opens_synthetic_source() {
        let mut source = VideoSource::open(&settings("stub://door")).unwrap();
        assert!(!source.is_still_image());
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
        assert_eq!(source.describe(), "stub://door");
        assert_eq!(source.frames_captured(), 1);
    }

    #[test]
    fn missing_video_file_is_fatal() {
        let err = VideoSource::open(&settings("/nonexistent/walk.mp4"))
            .err()
            .expect("open must fail");
        assert!(format!("{err}").contains("does not exist"));
    }

    #[test]
    fn missing_still_image_is_fatal() {
        assert!(VideoSource::open(&settings("/nonexistent/shot.jpg")).is_err());
    }
}
