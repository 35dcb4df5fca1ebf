//! FFmpeg-backed video source.
//!
//! Opens anything libavformat can open (files, RTSP/HTTP URLs, capture
//! devices), decodes the best video stream and converts frames to RGB24.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;

use crate::frame::{Frame, StreamClock};

pub(crate) struct FfmpegSource {
    location: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    packets_dropped: u64,
    eof_sent: bool,
    clock: StreamClock,
}

impl FfmpegSource {
    pub(crate) fn open(location: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&location)
            .with_context(|| format!("failed to open '{}' with ffmpeg", location))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("'{}' has no video track", location))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = rgb_scaler(decoder.format(), decoder.width(), decoder.height())?;

        log::info!(
            "VideoSource: opened {} (ffmpeg {}x{})",
            location,
            decoder.width(),
            decoder.height()
        );
        Ok(Self {
            location: location.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            packets_dropped: 0,
            eof_sent: false,
            clock: StreamClock::start(),
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            match self.next_packet() {
                Some(packet) => {
                    // Corrupt or partial packets are common on network streams.
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        self.packets_dropped += 1;
                        log::warn!(
                            "VideoSource: dropped undecodable packet from {} ({} so far): {}",
                            self.location,
                            self.packets_dropped,
                            e
                        );
                    }
                }
                None => {
                    // Flush frames still buffered in the decoder.
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    pub(crate) fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let input = self.scaler.input();
        if (input.format, input.width, input.height)
            != (decoded.format(), decoded.width(), decoded.height())
        {
            log::info!(
                "VideoSource: {} changed to {}x{}, rebuilding scaler",
                self.location,
                decoded.width(),
                decoded.height()
            );
            self.scaler = rgb_scaler(decoded.format(), decoded.width(), decoded.height())?;
        }
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let image = frame_to_image(&rgb_frame)?;
        self.frame_count += 1;
        Ok(Frame::new(image, self.clock.now(), self.frame_count))
    }
}

fn rgb_scaler(
    format: ffmpeg::util::format::pixel::Pixel,
    width: u32,
    height: u32,
) -> Result<ffmpeg::software::scaling::Context> {
    ffmpeg::software::scaling::Context::get(
        format,
        width,
        height,
        ffmpeg::util::format::pixel::Pixel::RGB24,
        width,
        height,
        ffmpeg::software::scaling::flag::Flags::BILINEAR,
    )
    .context("create ffmpeg scaler")
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow::anyhow!("decoded frame buffer has the wrong size"))
}
