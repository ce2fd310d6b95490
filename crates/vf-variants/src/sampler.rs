//! Parameter sampling: Preset -> ParameterSet.
//!
//! Every enabled range is drawn uniformly from `[min, max]`; disabled ranges
//! take the neutral value for their key. Integral keys (bitrates, frame rate,
//! pixel size, font size, border width) are rounded after the draw. Sampling
//! never fails.

use rand::seq::SliceRandom;
use rand::Rng;

use vf_core::params::neutral;
use vf_core::preset::{FlipPolicy, WatermarkPosition, WatermarkSettings};
use vf_core::{
    ImageParameters, ImagePreset, ParameterSet, Parameters, Preset, RangeParameter,
    VideoParameters, VideoPreset, WatermarkParameters,
};

/// Opacity used when a watermark's opacity range is disabled.
const NEUTRAL_OPACITY: f64 = 0.5;
/// Font size used when a watermark's size range is disabled.
const NEUTRAL_FONT_SIZE: f64 = 24.0;

/// Stateless sampler shared by all call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampler;

impl Sampler {
    pub fn new() -> Self {
        Self
    }

    /// Sample one parameter set using the thread-local RNG.
    pub fn sample(&self, preset: &Preset, variant_index: usize) -> ParameterSet {
        self.sample_with(&mut rand::thread_rng(), preset, variant_index)
    }

    /// Sample with a caller-supplied RNG (seeded in tests).
    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        preset: &Preset,
        variant_index: usize,
    ) -> ParameterSet {
        let values = match preset {
            Preset::Video(p) => Parameters::Video(sample_video(rng, p)),
            Preset::Image(p) => Parameters::Image(sample_image(rng, p)),
        };
        ParameterSet {
            variant_index,
            values,
        }
    }

    /// Sample `copies` parameter sets with indices `0..copies`.
    pub fn sample_many(&self, preset: &Preset, copies: usize) -> Vec<ParameterSet> {
        let mut rng = rand::thread_rng();
        (0..copies)
            .map(|i| self.sample_with(&mut rng, preset, i))
            .collect()
    }
}

fn sample_video<R: Rng + ?Sized>(rng: &mut R, p: &VideoPreset) -> VideoParameters {
    VideoParameters {
        speed: draw(rng, &p.speed, neutral::SPEED),
        trim_start: draw(rng, &p.trim_start, neutral::TRIM),
        trim_end: draw(rng, &p.trim_end, neutral::TRIM),
        saturation: draw(rng, &p.saturation, neutral::FACTOR),
        contrast: draw(rng, &p.contrast, neutral::FACTOR),
        brightness: draw(rng, &p.brightness, neutral::FACTOR),
        gamma: draw(rng, &p.gamma, neutral::FACTOR),
        volume: draw(rng, &p.volume, neutral::FACTOR),
        audio_bitrate: draw_int(rng, &p.audio_bitrate, neutral::AUDIO_BITRATE),
        video_bitrate: draw_int(rng, &p.video_bitrate, neutral::VIDEO_BITRATE),
        frame_rate: draw_int(rng, &p.frame_rate, neutral::FRAME_RATE),
        vignette: draw(rng, &p.vignette, neutral::OFFSET),
        noise: draw(rng, &p.noise, neutral::OFFSET),
        rotation: draw(rng, &p.rotation, neutral::OFFSET),
        zoom: draw(rng, &p.zoom, neutral::FACTOR),
        pixel_size: draw_int(rng, &p.pixel_size, neutral::PIXEL_SIZE),
        flip_horizontal: flip(rng, &p.flip_horizontal),
        watermark: sample_watermark(rng, &p.watermark),
        resolution: p.resolution.clone(),
    }
}

fn sample_image<R: Rng + ?Sized>(rng: &mut R, p: &ImagePreset) -> ImageParameters {
    ImageParameters {
        brightness: draw(rng, &p.brightness, neutral::FACTOR),
        contrast: draw(rng, &p.contrast, neutral::FACTOR),
        saturation: draw(rng, &p.saturation, neutral::FACTOR),
        compression: draw(rng, &p.compression, neutral::COMPRESSION),
        flip_horizontal: flip(rng, &p.flip_horizontal),
        blur_border: draw_int(rng, &p.blur_border, 0),
    }
}

fn sample_watermark<R: Rng + ?Sized>(
    rng: &mut R,
    w: &WatermarkSettings,
) -> Option<WatermarkParameters> {
    if !w.enabled || w.text.trim().is_empty() {
        return None;
    }
    let position = match w.position {
        WatermarkPosition::Random => *WatermarkPosition::CORNERS
            .choose(rng)
            .unwrap_or(&WatermarkPosition::BottomRight),
        fixed => fixed,
    };
    Some(WatermarkParameters {
        text: w.text.clone(),
        opacity: draw(rng, &w.opacity, NEUTRAL_OPACITY),
        font_size: draw(rng, &w.size, NEUTRAL_FONT_SIZE).round().max(1.0) as u32,
        position,
    })
}

/// Uniform draw from an inclusive range, or the neutral value when disabled.
fn draw<R: Rng + ?Sized>(rng: &mut R, range: &RangeParameter, neutral: f64) -> f64 {
    if !range.enabled {
        return neutral;
    }
    // Presets are normalized on import; order the bounds anyway so an
    // unvalidated preset cannot panic the RNG.
    let (lo, hi) = if range.min <= range.max {
        (range.min, range.max)
    } else {
        (range.max, range.min)
    };
    if lo == hi {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

fn draw_int<R: Rng + ?Sized>(rng: &mut R, range: &RangeParameter, neutral: u32) -> u32 {
    if !range.enabled {
        return neutral;
    }
    let value = draw(rng, range, neutral as f64).round();
    // Keep the rounded value inside the range when an integer fits in it.
    let lo = range.min.min(range.max).ceil();
    let hi = range.min.max(range.max).floor();
    let value = if lo <= hi { value.clamp(lo, hi) } else { value };
    value.max(0.0) as u32
}

fn flip<R: Rng + ?Sized>(rng: &mut R, policy: &FlipPolicy) -> bool {
    if !policy.enabled || !policy.probability.is_finite() {
        return false;
    }
    rng.gen_bool(policy.probability.clamp(0.0, 1.0))
}
