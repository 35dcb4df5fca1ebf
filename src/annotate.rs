//! Diagnostic overlay.
//!
//! Draws detection boxes, the inference latency, the current count and, above
//! the alert capacity, a filled warning banner at the bottom-left. Each call is
//! independent; nothing is carried between frames.
//!
//! Text uses the bundled DejaVu Sans Mono unless `overlay.font_path` names
//! another TrueType/OpenType font.

use std::path::Path;
use std::time::Duration;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::PixelBox;
use crate::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const ALERT_TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BANNER_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

const BUNDLED_FONT: &[u8] = include_bytes!("../assets/font/DejaVuSansMono.ttf");

const TEXT_SCALE: f32 = 14.0;
/// Text baselines, in pixels from the top-left corner.
const LATENCY_ORIGIN: (i32, i32) = (15, 15);
const COUNT_ORIGIN: (i32, i32) = (15, 45);
/// Banner text offset from the left and bottom edges.
const BANNER_OFFSET: i32 = 10;
const BANNER_PADDING: i32 = 2;

pub const ALERT_MESSAGE: &str = "Alert! Maximum count reached";

pub struct FrameAnnotator {
    font: FontVec,
    alert_capacity: usize,
}

impl FrameAnnotator {
    /// Annotator using the bundled font.
    pub fn new(alert_capacity: usize) -> Result<Self> {
        let font = FontVec::try_from_vec(BUNDLED_FONT.to_vec())
            .map_err(|_| anyhow!("bundled overlay font is invalid"))?;
        Ok(Self {
            font,
            alert_capacity,
        })
    }

    /// Annotator using the font at `font_path`, or the bundled one.
    pub fn with_font_file(alert_capacity: usize, font_path: Option<&Path>) -> Result<Self> {
        let Some(path) = font_path else {
            return Self::new(alert_capacity);
        };
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read overlay font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow!("invalid overlay font {}", path.display()))?;
        log::info!("overlay font loaded from {}", path.display());
        Ok(Self {
            font,
            alert_capacity,
        })
    }

    pub fn alert_capacity(&self) -> usize {
        self.alert_capacity
    }

    /// Draw the overlay for one processed frame.
    pub fn annotate(&self, frame: &mut Frame, boxes: &[PixelBox], count: usize, latency: Duration) {
        let canvas = &mut frame.image;
        for bbox in boxes {
            draw_hollow_rect_mut(canvas, box_rect(bbox), BOX_COLOR);
        }

        let latency_text = format!("Inference time: {:.3}ms", latency.as_secs_f64() * 1000.0);
        self.draw_text(canvas, LATENCY_ORIGIN, TEXT_COLOR, &latency_text);
        let count_text = format!("Current count: {}", count);
        self.draw_text(canvas, COUNT_ORIGIN, TEXT_COLOR, &count_text);

        if count > self.alert_capacity {
            self.draw_alert(canvas);
        }
    }

    fn draw_alert(&self, canvas: &mut RgbImage) {
        let (text_width, text_height) = self.measure(ALERT_MESSAGE);
        let baseline = canvas.height() as i32 - BANNER_OFFSET;
        let banner = Rect::at(BANNER_OFFSET, banner_top(baseline, text_height))
            .of_size(text_width.max(1), text_height + 2 * BANNER_PADDING as u32);
        draw_filled_rect_mut(canvas, banner, BANNER_COLOR);
        self.draw_text(canvas, (BANNER_OFFSET, baseline), ALERT_TEXT_COLOR, ALERT_MESSAGE);
    }

    /// Draw `text` with its baseline at `origin`.
    fn draw_text(&self, canvas: &mut RgbImage, origin: (i32, i32), color: Rgb<u8>, text: &str) {
        let (_, height) = self.measure(text);
        let top = (origin.1 - height as i32).max(0);
        draw_text_mut(
            canvas,
            color,
            origin.0,
            top,
            PxScale::from(TEXT_SCALE),
            &self.font,
            text,
        );
    }

    fn measure(&self, text: &str) -> (u32, u32) {
        text_size(PxScale::from(TEXT_SCALE), &self.font, text)
    }
}

fn banner_top(baseline: i32, text_height: u32) -> i32 {
    baseline - text_height as i32 - BANNER_PADDING
}

fn box_rect(bbox: &PixelBox) -> Rect {
    let width = bbox.width().max(1) as u32;
    let height = bbox.height().max(1) as u32;
    Rect::at(bbox.xmin, bbox.ymin).of_size(width, height)
}
