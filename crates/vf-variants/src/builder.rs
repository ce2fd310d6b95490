//! Command building: ParameterSet -> TransformProgram.
//!
//! Video filter order is fixed: color composite, flip, geometry, overlays,
//! timing. The audio chain carries the tempo half of the speed pair followed
//! by volume. Image programs describe pixel operations for the canvas
//! backend.

use std::f64::consts::PI;

use vf_core::params::neutral;
use vf_core::preset::{parse_resolution, WatermarkPosition};
use vf_core::{
    Error, ImageParameters, MediaKind, ParameterSet, Parameters, Result, VideoParameters,
    WatermarkParameters,
};

use crate::program::{format_number, OutputSettings, StepArgs, StreamKind, TransformProgram, TransformStep, Trim};

/// Values closer than this to neutral count as inactive.
const EPSILON: f64 = 1e-6;

/// Fixed x264 profile.
const VIDEO_CODEC: &str = "libx264";
const VIDEO_PRESET: &str = "medium";
const VIDEO_CRF: u8 = 23;
const AUDIO_CODEC: &str = "aac";

/// Range one `atempo` instance accepts on older ffmpeg builds.
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// Stateless builder shared by all call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBuilder;

impl CommandBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the program for one parameter set.
    ///
    /// Fails with [`Error::Build`] when the parameters belong to a different
    /// media kind, or when a video resolution cannot be parsed.
    pub fn build(&self, params: &ParameterSet, kind: MediaKind) -> Result<TransformProgram> {
        match (&params.values, kind) {
            (Parameters::Video(v), MediaKind::Video) => build_video(v),
            (Parameters::Image(p), MediaKind::Image) => Ok(build_image(p)),
            (_, kind) => Err(Error::Build(format!(
                "{} parameters cannot drive a {kind} program",
                params.kind()
            ))),
        }
    }
}

fn active(value: f64, neutral: f64) -> bool {
    (value - neutral).abs() > EPSILON
}

fn build_video(p: &VideoParameters) -> Result<TransformProgram> {
    let mut steps = Vec::new();
    let mut diagnostics = Vec::new();

    // 1. color composite
    let mut eq = StepArgs::new();
    if active(p.saturation, neutral::FACTOR) {
        eq = eq.with("saturation", format_number(p.saturation));
    }
    if active(p.contrast, neutral::FACTOR) {
        eq = eq.with("contrast", format_number(p.contrast));
    }
    if active(p.brightness, neutral::FACTOR) {
        // eq brightness is an additive offset around 0.
        eq = eq.with("brightness", format_number(p.brightness - neutral::FACTOR));
    }
    if active(p.gamma, neutral::FACTOR) {
        eq = eq.with("gamma", format_number(p.gamma));
    }
    if !eq.is_empty() {
        steps.push(TransformStep::new("color", "eq", StreamKind::Video, eq));
    }

    // 2. flip
    if p.flip_horizontal {
        steps.push(TransformStep::new("flip", "hflip", StreamKind::Video, StepArgs::new()));
    }

    // 3. geometry
    if active(p.rotation, neutral::OFFSET) {
        steps.push(TransformStep::new(
            "rotation",
            "rotate",
            StreamKind::Video,
            StepArgs::new()
                .with("angle", format_number(p.rotation * PI / 180.0))
                .with("fillcolor", "black"),
        ));
    }
    if active(p.zoom, neutral::FACTOR) && p.zoom > 0.0 {
        steps.extend(zoom_steps(p.zoom));
    }
    if p.pixel_size > neutral::PIXEL_SIZE {
        steps.extend(pixelate_steps(p.pixel_size));
    }
    if let Some(ref res) = p.resolution {
        let (w, h) = parse_resolution(res).map_err(|e| Error::Build(e.to_string()))?;
        steps.push(TransformStep::new(
            "resolution",
            "scale",
            StreamKind::Video,
            StepArgs::new().with("w", w.to_string()).with("h", h.to_string()),
        ));
    }

    // 4. overlays
    if p.vignette > EPSILON {
        let angle = (p.vignette.min(1.0) * PI / 2.0).max(0.0);
        steps.push(TransformStep::new(
            "vignette",
            "vignette",
            StreamKind::Video,
            StepArgs::new().with("angle", format_number(angle)),
        ));
    }
    if p.noise.round() >= 1.0 {
        steps.push(TransformStep::new(
            "noise",
            "noise",
            StreamKind::Video,
            StepArgs::new()
                .with("alls", format!("{}", p.noise.round().min(100.0) as u32))
                .with("allf", "t"),
        ));
    }
    if let Some(ref wm) = p.watermark {
        steps.push(watermark_step(wm));
    }

    // 5/6. speed pair, then volume
    if active(p.speed, neutral::SPEED) && p.speed > 0.0 {
        steps.push(TransformStep::new(
            "speed",
            "setpts",
            StreamKind::Video,
            StepArgs::new().with("expr", format!("{}*PTS", format_number(1.0 / p.speed))),
        ));
        for factor in atempo_chain(p.speed) {
            steps.push(TransformStep::new(
                "speed",
                "atempo",
                StreamKind::Audio,
                StepArgs::new().with("expr", format_number(factor)),
            ));
        }
    }
    if active(p.volume, neutral::FACTOR) {
        steps.push(TransformStep::new(
            "volume",
            "volume",
            StreamKind::Audio,
            StepArgs::new().with("expr", format_number(p.volume.max(0.0))),
        ));
    }

    let trim = build_trim(p.trim_start, p.trim_end, &mut diagnostics);

    let video_bitrate =
        (p.video_bitrate != neutral::VIDEO_BITRATE && p.video_bitrate > 0).then_some(p.video_bitrate);
    let output = OutputSettings::Mp4 {
        video_codec: VIDEO_CODEC.into(),
        preset: VIDEO_PRESET.into(),
        crf: video_bitrate.is_none().then_some(VIDEO_CRF),
        video_bitrate_kbps: video_bitrate,
        audio_codec: AUDIO_CODEC.into(),
        audio_bitrate_kbps: (p.audio_bitrate != neutral::AUDIO_BITRATE && p.audio_bitrate > 0)
            .then_some(p.audio_bitrate),
        frame_rate: (p.frame_rate != neutral::FRAME_RATE && p.frame_rate > 0)
            .then_some(p.frame_rate),
    };

    Ok(TransformProgram {
        media_kind: MediaKind::Video,
        steps,
        trim,
        output,
        diagnostics,
    })
}

/// Seek to `start`; keep `end - start` seconds. A non-positive duration
/// suppresses the trim entirely.
fn build_trim(start: f64, end: f64, diagnostics: &mut Vec<String>) -> Option<Trim> {
    if start.abs() < EPSILON && end.abs() < EPSILON {
        return None;
    }
    let duration = end - start;
    if duration <= EPSILON {
        let msg = format!(
            "trim suppressed: trimEnd {} is not after trimStart {}",
            format_number(end),
            format_number(start)
        );
        tracing::warn!("{msg}");
        diagnostics.push(msg);
        return None;
    }
    Some(Trim {
        start: start.max(0.0),
        duration,
    })
}

/// Split a tempo factor into `atempo` instances each within `[0.5, 2.0]`.
fn atempo_chain(speed: f64) -> Vec<f64> {
    let mut factors = Vec::new();
    let mut remaining = speed;
    while remaining > ATEMPO_MAX {
        factors.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        factors.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    factors.push(remaining);
    factors
}

fn zoom_steps(zoom: f64) -> Vec<TransformStep> {
    let z = format_number(zoom);
    let scale = TransformStep::new(
        "zoom",
        "scale",
        StreamKind::Video,
        StepArgs::new()
            .with("w", format!("trunc(iw*{z}/2)*2"))
            .with("h", format!("trunc(ih*{z}/2)*2")),
    );
    let fit = if zoom > 1.0 {
        TransformStep::new(
            "zoom",
            "crop",
            StreamKind::Video,
            StepArgs::new()
                .with("w", format!("trunc(iw/{z}/2)*2"))
                .with("h", format!("trunc(ih/{z}/2)*2")),
        )
    } else {
        TransformStep::new(
            "zoom",
            "pad",
            StreamKind::Video,
            StepArgs::new()
                .with("w", format!("trunc(iw/{z}/2)*2"))
                .with("h", format!("trunc(ih/{z}/2)*2"))
                .with("x", "(ow-iw)/2")
                .with("y", "(oh-ih)/2"),
        )
    };
    vec![scale, fit]
}

fn pixelate_steps(size: u32) -> Vec<TransformStep> {
    vec![
        TransformStep::new(
            "pixelate",
            "scale",
            StreamKind::Video,
            StepArgs::new()
                .with("w", format!("trunc(iw/{size}/2)*2"))
                .with("h", format!("trunc(ih/{size}/2)*2")),
        ),
        TransformStep::new(
            "pixelate",
            "scale",
            StreamKind::Video,
            StepArgs::new()
                .with("w", format!("iw*{size}"))
                .with("h", format!("ih*{size}"))
                .with("flags", "neighbor"),
        ),
    ]
}

fn watermark_step(wm: &WatermarkParameters) -> TransformStep {
    const MARGIN: &str = "20";
    let (x, y) = match wm.position {
        WatermarkPosition::TopLeft => (MARGIN.to_string(), MARGIN.to_string()),
        WatermarkPosition::TopRight => (format!("w-tw-{MARGIN}"), MARGIN.to_string()),
        WatermarkPosition::BottomLeft => (MARGIN.to_string(), format!("h-th-{MARGIN}")),
        WatermarkPosition::Center => ("(w-tw)/2".to_string(), "(h-th)/2".to_string()),
        WatermarkPosition::BottomRight | WatermarkPosition::Random => {
            (format!("w-tw-{MARGIN}"), format!("h-th-{MARGIN}"))
        }
    };
    TransformStep::new(
        "watermark",
        "drawtext",
        StreamKind::Video,
        StepArgs::new()
            .with("text", wm.text.clone())
            .with("expansion", "none")
            .with("fontsize", wm.font_size.to_string())
            .with(
                "fontcolor",
                format!("white@{}", format_number(wm.opacity.clamp(0.0, 1.0))),
            )
            .with("x", x)
            .with("y", y),
    )
}

fn build_image(p: &ImageParameters) -> TransformProgram {
    let mut steps = Vec::new();

    let mut filter = StepArgs::new();
    if active(p.brightness, neutral::FACTOR) {
        filter = filter.with("brightness", format_number(p.brightness));
    }
    if active(p.contrast, neutral::FACTOR) {
        filter = filter.with("contrast", format_number(p.contrast));
    }
    if active(p.saturation, neutral::FACTOR) {
        filter = filter.with("saturate", format_number(p.saturation));
    }
    if !filter.is_empty() {
        steps.push(TransformStep::new("color", "filter", StreamKind::Pixels, filter));
    }

    if p.flip_horizontal {
        steps.push(TransformStep::new("flip", "hflip", StreamKind::Pixels, StepArgs::new()));
    }

    if p.blur_border > 0 {
        steps.push(TransformStep::new(
            "border",
            "border",
            StreamKind::Pixels,
            StepArgs::new().with("width", p.blur_border.to_string()),
        ));
    }

    let quality = (p.compression * 100.0).round().clamp(1.0, 100.0) as u8;

    TransformProgram {
        media_kind: MediaKind::Image,
        steps,
        trim: None,
        output: OutputSettings::Jpeg { quality },
        diagnostics: Vec::new(),
    }
}

/// CSS-style filter string for an image program's color step, e.g.
/// `brightness(1.1) contrast(0.9) saturate(1.2)`.
pub fn css_filter(program: &TransformProgram) -> Option<String> {
    let step = program.pixel_steps().find(|s| s.operation == "filter")?;
    let parts: Vec<String> = step.args.iter().map(|(k, v)| format!("{k}({v})")).collect();
    Some(parts.join(" "))
}
