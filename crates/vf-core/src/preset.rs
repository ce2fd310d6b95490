//! Declarative presets: range parameters, flip policy, and watermark settings.
//!
//! A [`Preset`] is a named bundle of [`RangeParameter`]s plus a few flags. The
//! sampler draws one concrete value per range for every requested copy, so
//! presets are validated once at creation/import time and treated as
//! immutable afterwards. All shapes serialize in camelCase and round-trip
//! losslessly through JSON snapshots.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::media::MediaKind;
use crate::params::neutral;
use crate::Error;

// ---------------------------------------------------------------------------
// RangeParameter
// ---------------------------------------------------------------------------

/// A `{min, max, enabled}` sampling bound.
///
/// When `enabled` is false the neutral default for the key is used and the
/// bounds are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeParameter<T = f64> {
    pub min: T,
    pub max: T,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RangeParameter<f64> {
    /// An enabled range.
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            enabled: true,
        }
    }

    /// A disabled range pinned at `value`.
    pub fn disabled(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            enabled: false,
        }
    }

    /// True when `min > max`.
    pub fn is_inverted(&self) -> bool {
        self.min > self.max
    }

    /// True when `v` lies inside `[min, max]`.
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Lower bound a key accepts once enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Any,
    NonNegative,
    Positive,
    /// `0 < v <= 1`
    UnitInterval,
}

impl Bound {
    fn check(self, key: &str, range: &RangeParameter) -> Result<()> {
        let ok = match self {
            Bound::Any => true,
            Bound::NonNegative => range.min >= 0.0,
            Bound::Positive => range.min > 0.0,
            Bound::UnitInterval => range.min > 0.0 && range.max <= 1.0,
        };
        if ok {
            return Ok(());
        }
        let rule = match self {
            Bound::Any => "any value",
            Bound::NonNegative => "values >= 0",
            Bound::Positive => "values > 0",
            Bound::UnitInterval => "values in (0, 1]",
        };
        Err(Error::Validation(format!(
            "{key} accepts {rule}, got [{}, {}]",
            range.min, range.max
        )))
    }
}

// ---------------------------------------------------------------------------
// FlipPolicy
// ---------------------------------------------------------------------------

/// Horizontal flip policy: the flip happens when `enabled` and a coin with
/// the given `probability` lands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlipPolicy {
    pub enabled: bool,
    pub probability: f64,
}

impl FlipPolicy {
    pub fn off() -> Self {
        Self {
            enabled: false,
            probability: 1.0,
        }
    }

    pub fn always() -> Self {
        Self {
            enabled: true,
            probability: 1.0,
        }
    }

    pub fn with_probability(probability: f64) -> Self {
        Self {
            enabled: true,
            probability,
        }
    }
}

/// Accepts either a bare boolean or a `{enabled, probability}` object.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlipRepr {
    Flag(bool),
    Policy {
        enabled: bool,
        probability: Option<f64>,
    },
}

impl FlipRepr {
    fn into_policy(self, default_probability: f64) -> FlipPolicy {
        match self {
            FlipRepr::Flag(enabled) => FlipPolicy {
                enabled,
                probability: default_probability,
            },
            FlipRepr::Policy {
                enabled,
                probability,
            } => FlipPolicy {
                enabled,
                probability: probability.unwrap_or(default_probability),
            },
        }
    }
}

/// Video presets pass a bare `true` straight through.
const VIDEO_FLIP_PROBABILITY: f64 = 1.0;
/// Image presets flip a fair coin for a bare `true`.
const IMAGE_FLIP_PROBABILITY: f64 = 0.5;

fn video_flip<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<FlipPolicy, D::Error> {
    FlipRepr::deserialize(d).map(|r| r.into_policy(VIDEO_FLIP_PROBABILITY))
}

fn image_flip<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<FlipPolicy, D::Error> {
    FlipRepr::deserialize(d).map(|r| r.into_policy(IMAGE_FLIP_PROBABILITY))
}

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Where a text watermark is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
    /// Resolved to a concrete corner per variant by the sampler.
    Random,
}

impl WatermarkPosition {
    /// The concrete positions `Random` can resolve to.
    pub const CORNERS: [WatermarkPosition; 4] = [
        WatermarkPosition::TopLeft,
        WatermarkPosition::TopRight,
        WatermarkPosition::BottomLeft,
        WatermarkPosition::BottomRight,
    ];
}

/// Watermark sub-object of a video preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatermarkSettings {
    pub enabled: bool,
    pub text: String,
    pub opacity: RangeParameter,
    /// Font size in pixels.
    pub size: RangeParameter,
    pub position: WatermarkPosition,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            text: String::new(),
            opacity: RangeParameter::new(0.3, 0.6),
            size: RangeParameter::new(18.0, 28.0),
            position: WatermarkPosition::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// VideoPreset
// ---------------------------------------------------------------------------

/// Range configuration for video variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoPreset {
    pub name: String,
    pub speed: RangeParameter,
    /// Seconds to seek into the source.
    pub trim_start: RangeParameter,
    /// Absolute end timestamp in seconds; the emitted duration is
    /// `trim_end - trim_start`.
    pub trim_end: RangeParameter,
    pub saturation: RangeParameter,
    pub contrast: RangeParameter,
    pub brightness: RangeParameter,
    pub gamma: RangeParameter,
    pub volume: RangeParameter,
    /// kbps
    pub audio_bitrate: RangeParameter,
    /// kbps
    pub video_bitrate: RangeParameter,
    pub frame_rate: RangeParameter,
    pub vignette: RangeParameter,
    pub noise: RangeParameter,
    /// Degrees.
    pub rotation: RangeParameter,
    pub zoom: RangeParameter,
    pub pixel_size: RangeParameter,
    pub watermark: WatermarkSettings,
    #[serde(deserialize_with = "video_flip")]
    pub flip_horizontal: FlipPolicy,
    /// Target resolution as `WxH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl Default for VideoPreset {
    fn default() -> Self {
        Self {
            name: "default".into(),
            speed: RangeParameter::disabled(neutral::SPEED),
            trim_start: RangeParameter::disabled(neutral::TRIM),
            trim_end: RangeParameter::disabled(neutral::TRIM),
            saturation: RangeParameter::disabled(neutral::FACTOR),
            contrast: RangeParameter::disabled(neutral::FACTOR),
            brightness: RangeParameter::disabled(neutral::FACTOR),
            gamma: RangeParameter::disabled(neutral::FACTOR),
            volume: RangeParameter::disabled(neutral::FACTOR),
            audio_bitrate: RangeParameter::disabled(neutral::AUDIO_BITRATE as f64),
            video_bitrate: RangeParameter::disabled(neutral::VIDEO_BITRATE as f64),
            frame_rate: RangeParameter::disabled(neutral::FRAME_RATE as f64),
            vignette: RangeParameter::disabled(neutral::OFFSET),
            noise: RangeParameter::disabled(neutral::OFFSET),
            rotation: RangeParameter::disabled(neutral::OFFSET),
            zoom: RangeParameter::disabled(neutral::FACTOR),
            pixel_size: RangeParameter::disabled(neutral::PIXEL_SIZE as f64),
            watermark: WatermarkSettings::default(),
            flip_horizontal: FlipPolicy {
                enabled: false,
                probability: VIDEO_FLIP_PROBABILITY,
            },
            resolution: None,
        }
    }
}

impl VideoPreset {
    fn ranges_mut(&mut self) -> Vec<(&'static str, Bound, &mut RangeParameter)> {
        vec![
            ("speed", Bound::Positive, &mut self.speed),
            ("trimStart", Bound::NonNegative, &mut self.trim_start),
            ("trimEnd", Bound::NonNegative, &mut self.trim_end),
            ("saturation", Bound::NonNegative, &mut self.saturation),
            ("contrast", Bound::Any, &mut self.contrast),
            ("brightness", Bound::NonNegative, &mut self.brightness),
            ("gamma", Bound::Positive, &mut self.gamma),
            ("volume", Bound::NonNegative, &mut self.volume),
            ("audioBitrate", Bound::Positive, &mut self.audio_bitrate),
            ("videoBitrate", Bound::Positive, &mut self.video_bitrate),
            ("frameRate", Bound::Positive, &mut self.frame_rate),
            ("vignette", Bound::NonNegative, &mut self.vignette),
            ("noise", Bound::NonNegative, &mut self.noise),
            ("rotation", Bound::Any, &mut self.rotation),
            ("zoom", Bound::Positive, &mut self.zoom),
            ("pixelSize", Bound::Positive, &mut self.pixel_size),
            ("watermark.opacity", Bound::UnitInterval, &mut self.watermark.opacity),
            ("watermark.size", Bound::Positive, &mut self.watermark.size),
        ]
    }
}

// ---------------------------------------------------------------------------
// ImagePreset
// ---------------------------------------------------------------------------

/// Range configuration for image variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImagePreset {
    pub name: String,
    pub brightness: RangeParameter,
    pub contrast: RangeParameter,
    pub saturation: RangeParameter,
    /// JPEG quality as a fraction in `(0, 1]`.
    pub compression: RangeParameter,
    #[serde(deserialize_with = "image_flip")]
    pub flip_horizontal: FlipPolicy,
    /// Width of the darkened border in pixels.
    pub blur_border: RangeParameter,
}

impl Default for ImagePreset {
    fn default() -> Self {
        Self {
            name: "default".into(),
            brightness: RangeParameter::disabled(neutral::FACTOR),
            contrast: RangeParameter::disabled(neutral::FACTOR),
            saturation: RangeParameter::disabled(neutral::FACTOR),
            compression: RangeParameter::disabled(neutral::COMPRESSION),
            flip_horizontal: FlipPolicy {
                enabled: false,
                probability: IMAGE_FLIP_PROBABILITY,
            },
            blur_border: RangeParameter::disabled(neutral::OFFSET),
        }
    }
}

impl ImagePreset {
    fn ranges_mut(&mut self) -> Vec<(&'static str, Bound, &mut RangeParameter)> {
        vec![
            ("brightness", Bound::NonNegative, &mut self.brightness),
            ("contrast", Bound::NonNegative, &mut self.contrast),
            ("saturation", Bound::NonNegative, &mut self.saturation),
            ("compression", Bound::UnitInterval, &mut self.compression),
            ("blurBorder", Bound::NonNegative, &mut self.blur_border),
        ]
    }
}

// ---------------------------------------------------------------------------
// Preset
// ---------------------------------------------------------------------------

/// A video or image preset, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Preset {
    Video(VideoPreset),
    Image(ImagePreset),
}

impl Preset {
    pub fn kind(&self) -> MediaKind {
        match self {
            Preset::Video(_) => MediaKind::Video,
            Preset::Image(_) => MediaKind::Image,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Preset::Video(p) => &p.name,
            Preset::Image(p) => &p.name,
        }
    }

    /// Swap inverted ranges in place and check every enabled range against
    /// its key's bounds.
    ///
    /// Returns one warning per swapped range. Fails with
    /// [`Error::Validation`] on non-finite bounds, out-of-domain values, a
    /// flip probability outside `[0, 1]`, or a malformed resolution.
    pub fn normalize(&mut self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        let (ranges, flip) = match self {
            Preset::Video(p) => {
                if let Some(ref res) = p.resolution {
                    parse_resolution(res)?;
                }
                let flip = p.flip_horizontal;
                (p.ranges_mut(), flip)
            }
            Preset::Image(p) => {
                let flip = p.flip_horizontal;
                (p.ranges_mut(), flip)
            }
        };

        for (key, bound, range) in ranges {
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(Error::Validation(format!("{key} has a non-finite bound")));
            }
            if range.is_inverted() {
                warnings.push(format!(
                    "{key}: min {} > max {}; bounds swapped",
                    range.min, range.max
                ));
                std::mem::swap(&mut range.min, &mut range.max);
            }
            if range.enabled {
                bound.check(key, range)?;
            }
        }

        if !(0.0..=1.0).contains(&flip.probability) {
            return Err(Error::Validation(format!(
                "flipHorizontal.probability must be in [0, 1], got {}",
                flip.probability
            )));
        }

        Ok(warnings)
    }

    /// Like [`normalize`](Self::normalize) but rejects inverted ranges
    /// instead of swapping them.
    pub fn validate_strict(&self) -> Result<()> {
        let mut copy = self.clone();
        let warnings = copy.normalize()?;
        if let Some(first) = warnings.into_iter().next() {
            return Err(Error::Validation(first.replace("; bounds swapped", "")));
        }
        Ok(())
    }

    /// Write a named snapshot as pretty JSON.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("preset serialize error: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a snapshot written by [`save_snapshot`](Self::save_snapshot) or
    /// exported by a client.
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Validation(format!("preset parse error: {e}")))
    }
}

impl From<VideoPreset> for Preset {
    fn from(p: VideoPreset) -> Self {
        Preset::Video(p)
    }
}

impl From<ImagePreset> for Preset {
    fn from(p: ImagePreset) -> Self {
        Preset::Image(p)
    }
}

/// Parse a `WxH` resolution with even, positive dimensions.
pub fn parse_resolution(s: &str) -> Result<(u32, u32)> {
    let invalid = || Error::Validation(format!("resolution '{s}' is not WxH"));
    let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let w: u32 = w.trim().parse().map_err(|_| invalid())?;
    let h: u32 = h.trim().parse().map_err(|_| invalid())?;
    if w == 0 || h == 0 || w % 2 != 0 || h % 2 != 0 {
        return Err(Error::Validation(format!(
            "resolution '{s}' must have even, positive dimensions"
        )));
    }
    Ok((w, h))
}
