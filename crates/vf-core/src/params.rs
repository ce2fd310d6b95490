//! Concrete per-variant parameters sampled from a [`Preset`](crate::Preset).

use serde::{Deserialize, Serialize};

use crate::media::MediaKind;
use crate::preset::WatermarkPosition;

/// Neutral values used for disabled ranges and missing wire fields.
pub mod neutral {
    /// Multiplicative factors: saturation, contrast, brightness, gamma,
    /// volume, zoom.
    pub const FACTOR: f64 = 1.0;
    pub const SPEED: f64 = 1.0;
    /// Additive offsets: trims, rotation, vignette, noise, border width.
    pub const OFFSET: f64 = 0.0;
    pub const TRIM: f64 = 0.0;
    /// kbps
    pub const AUDIO_BITRATE: u32 = 128;
    /// kbps
    pub const VIDEO_BITRATE: u32 = 2500;
    pub const FRAME_RATE: u32 = 30;
    pub const PIXEL_SIZE: u32 = 1;
    pub const COMPRESSION: f64 = 0.92;
}

/// One concrete sampled instantiation of a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSet {
    pub variant_index: usize,
    #[serde(flatten)]
    pub values: Parameters,
}

impl ParameterSet {
    pub fn kind(&self) -> MediaKind {
        match self.values {
            Parameters::Video(_) => MediaKind::Video,
            Parameters::Image(_) => MediaKind::Image,
        }
    }

    pub fn video(&self) -> Option<&VideoParameters> {
        match &self.values {
            Parameters::Video(v) => Some(v),
            Parameters::Image(_) => None,
        }
    }

    pub fn image(&self) -> Option<&ImageParameters> {
        match &self.values {
            Parameters::Image(v) => Some(v),
            Parameters::Video(_) => None,
        }
    }
}

/// Kind-specific parameter values, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Parameters {
    Video(VideoParameters),
    Image(ImageParameters),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoParameters {
    pub speed: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub saturation: f64,
    pub contrast: f64,
    pub brightness: f64,
    pub gamma: f64,
    pub volume: f64,
    pub audio_bitrate: u32,
    pub video_bitrate: u32,
    pub frame_rate: u32,
    pub vignette: f64,
    pub noise: f64,
    pub rotation: f64,
    pub zoom: f64,
    pub pixel_size: u32,
    pub flip_horizontal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl Default for VideoParameters {
    fn default() -> Self {
        Self {
            speed: neutral::SPEED,
            trim_start: neutral::TRIM,
            trim_end: neutral::TRIM,
            saturation: neutral::FACTOR,
            contrast: neutral::FACTOR,
            brightness: neutral::FACTOR,
            gamma: neutral::FACTOR,
            volume: neutral::FACTOR,
            audio_bitrate: neutral::AUDIO_BITRATE,
            video_bitrate: neutral::VIDEO_BITRATE,
            frame_rate: neutral::FRAME_RATE,
            vignette: neutral::OFFSET,
            noise: neutral::OFFSET,
            rotation: neutral::OFFSET,
            zoom: neutral::FACTOR,
            pixel_size: neutral::PIXEL_SIZE,
            flip_horizontal: false,
            watermark: None,
            resolution: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkParameters {
    pub text: String,
    pub opacity: f64,
    pub font_size: u32,
    pub position: WatermarkPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageParameters {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub compression: f64,
    pub flip_horizontal: bool,
    pub blur_border: u32,
}

impl Default for ImageParameters {
    fn default() -> Self {
        Self {
            brightness: neutral::FACTOR,
            contrast: neutral::FACTOR,
            saturation: neutral::FACTOR,
            compression: neutral::COMPRESSION,
            flip_horizontal: false,
            blur_border: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_set_wire_shape() {
        let set = ParameterSet {
            variant_index: 2,
            values: Parameters::Video(VideoParameters {
                speed: 1.05,
                ..Default::default()
            }),
        };
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["variantIndex"], 2);
        assert_eq!(json["kind"], "video");
        assert_eq!(json["speed"], 1.05);
        assert!(json.get("watermark").is_none());

        let back: ParameterSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn missing_fields_take_neutral_values() {
        let params: VideoParameters = serde_json::from_str(r#"{"speed": 1.2}"#).unwrap();
        assert_eq!(params.speed, 1.2);
        assert_eq!(params.saturation, neutral::FACTOR);
        assert_eq!(params.frame_rate, neutral::FRAME_RATE);
        assert!(!params.flip_horizontal);
    }

    #[test]
    fn kind_accessors() {
        let set = ParameterSet {
            variant_index: 0,
            values: Parameters::Image(ImageParameters::default()),
        };
        assert_eq!(set.kind(), MediaKind::Image);
        assert!(set.image().is_some());
        assert!(set.video().is_none());
    }
}
