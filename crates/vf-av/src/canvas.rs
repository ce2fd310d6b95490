//! Pixel operations for still images.
//!
//! Color adjustments follow the CSS filter functions of the same name
//! (`brightness`, `contrast`, `saturate`) applied in that order, on 8-bit RGB.
//! The border darkens a band along each edge, ramping from
//! [`BORDER_EDGE_FACTOR`] at the edge to no change at the inner boundary.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader, RgbImage};

use vf_core::Error;

/// Brightness multiplier at the outermost border pixel.
pub const BORDER_EDGE_FACTOR: f32 = 0.4;

/// One image render: color filters, flip, border and encode quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasOps {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub flip_horizontal: bool,
    /// Border band width in pixels; 0 disables it.
    pub border: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
}

impl Default for CanvasOps {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            flip_horizontal: false,
            border: 0,
            quality: 92,
        }
    }
}

impl CanvasOps {
    fn has_color(&self) -> bool {
        self.brightness != 1.0 || self.contrast != 1.0 || self.saturation != 1.0
    }

    /// Decode `data`, apply the operations and return JPEG bytes.
    pub fn render(&self, data: &[u8]) -> vf_core::Result<Vec<u8>> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| Error::tool("canvas", format!("failed to read image: {e}")))?
            .decode()
            .map_err(|e| Error::tool("canvas", format!("failed to decode image: {e}")))?;

        let rgb = self.apply(img.to_rgb8());
        encode_jpeg(&rgb, self.quality)
    }

    /// Apply the pixel operations in place order: color, flip, border.
    pub fn apply(&self, mut rgb: RgbImage) -> RgbImage {
        if self.has_color() {
            for px in rgb.pixels_mut() {
                px.0 = self.adjust([px.0[0], px.0[1], px.0[2]]);
            }
        }
        if self.flip_horizontal {
            rgb = image::imageops::flip_horizontal(&rgb);
        }
        if self.border > 0 {
            darken_border(&mut rgb, self.border);
        }
        rgb
    }

    fn adjust(&self, [r, g, b]: [u8; 3]) -> [u8; 3] {
        let mut c = [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0];

        for v in &mut c {
            *v *= self.brightness;
            *v = (*v - 0.5) * self.contrast + 0.5;
        }

        let s = self.saturation;
        let [r, g, b] = c;
        let sat = [
            (0.213 + 0.787 * s) * r + (0.715 - 0.715 * s) * g + (0.072 - 0.072 * s) * b,
            (0.213 - 0.213 * s) * r + (0.715 + 0.285 * s) * g + (0.072 - 0.072 * s) * b,
            (0.213 - 0.213 * s) * r + (0.715 - 0.715 * s) * g + (0.072 + 0.928 * s) * b,
        ];

        sat.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

fn darken_border(rgb: &mut RgbImage, width: u32) {
    let (w, h) = rgb.dimensions();
    for (x, y, px) in rgb.enumerate_pixels_mut() {
        let edge = x.min(y).min(w - 1 - x).min(h - 1 - y);
        if edge >= width {
            continue;
        }
        let t = edge as f32 / width as f32;
        let factor = BORDER_EDGE_FACTOR + (1.0 - BORDER_EDGE_FACTOR) * t;
        for ch in px.0.iter_mut() {
            *ch = (*ch as f32 * factor).round() as u8;
        }
    }
}

/// Encode RGB pixels as JPEG at `quality` (clamped to 1..=100).
pub fn encode_jpeg(rgb: &RgbImage, quality: u8) -> vf_core::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    DynamicImage::ImageRgb8(rgb.clone())
        .write_with_encoder(encoder)
        .map_err(|e| Error::tool("canvas", format!("failed to encode jpeg: {e}")))?;
    Ok(buffer)
}
