//! The transform program model and its ffmpeg rendering.
//!
//! A [`TransformProgram`] is an ordered list of [`TransformStep`]s plus trim
//! and output settings. Rendering is a pure function of the program, so the
//! same parameters always produce the same argument vector.

use std::path::Path;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use vf_core::MediaKind;

/// Which stream a step filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    /// Pixel operation applied by the canvas backend.
    Pixels,
}

/// Ordered `key=value` arguments of a step. Serialized as a JSON object in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepArgs(Vec<(String, String)>);

impl StepArgs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.push((key.to_string(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for StepArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One named operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformStep {
    /// The user-facing effect this step implements (`color`, `speed`, ...).
    pub effect: String,
    /// Engine operation name (`eq`, `hflip`, `setpts`, ...).
    pub operation: String,
    pub stream: StreamKind,
    pub args: StepArgs,
}

impl TransformStep {
    pub fn new(effect: &str, operation: &str, stream: StreamKind, args: StepArgs) -> Self {
        Self {
            effect: effect.to_string(),
            operation: operation.to_string(),
            stream,
            args,
        }
    }

    /// Render as one filtergraph filter.
    ///
    /// A lone `expr` argument renders positionally (`setpts=0.8*PTS`);
    /// anything else renders as `name=k=v:k=v` with every value escaped by
    /// [`escape_filter_value`].
    pub fn render(&self) -> String {
        if self.args.is_empty() {
            return self.operation.clone();
        }
        if let (Some(expr), 1) = (self.args.get("expr"), self.args.0.len()) {
            return format!("{}={}", self.operation, expr);
        }
        let joined = self
            .args
            .iter()
            .map(|(k, v)| format!("{k}={}", escape_filter_value(v)))
            .collect::<Vec<_>>()
            .join(":");
        format!("{}={}", self.operation, joined)
    }
}

/// Seek and duration, both in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trim {
    pub start: f64,
    pub duration: f64,
}

/// Fixed encoder profile for each media kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum OutputSettings {
    Mp4 {
        video_codec: String,
        preset: String,
        /// `None` when an explicit video bitrate is set.
        crf: Option<u8>,
        video_bitrate_kbps: Option<u32>,
        audio_codec: String,
        audio_bitrate_kbps: Option<u32>,
        frame_rate: Option<u32>,
    },
    Jpeg {
        quality: u8,
    },
}

impl OutputSettings {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputSettings::Mp4 { .. } => "mp4",
            OutputSettings::Jpeg { .. } => "jpg",
        }
    }
}

/// An ordered, engine-agnostic description of the work for one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformProgram {
    pub media_kind: MediaKind,
    pub steps: Vec<TransformStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<Trim>,
    pub output: OutputSettings,
    /// Non-fatal notes raised while building (e.g. a suppressed trim).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl TransformProgram {
    fn chain(&self, stream: StreamKind) -> Option<String> {
        let filters: Vec<String> = self
            .steps
            .iter()
            .filter(|s| s.stream == stream)
            .map(TransformStep::render)
            .collect();
        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }

    /// The `-filter:v` chain, if any step targets video.
    pub fn video_filter(&self) -> Option<String> {
        self.chain(StreamKind::Video)
    }

    /// The `-filter:a` chain, if any step targets audio.
    pub fn audio_filter(&self) -> Option<String> {
        self.chain(StreamKind::Audio)
    }

    /// Steps that apply to decoded pixels (image programs).
    pub fn pixel_steps(&self) -> impl Iterator<Item = &TransformStep> {
        self.steps.iter().filter(|s| s.stream == StreamKind::Pixels)
    }

    pub fn find(&self, operation: &str) -> Option<&TransformStep> {
        self.steps.iter().find(|s| s.operation == operation)
    }

    /// Distinct effect names in application order, with `trim` first when
    /// present.
    pub fn applied_effects(&self) -> Vec<String> {
        let mut effects: Vec<String> = Vec::new();
        if self.trim.is_some() {
            effects.push("trim".into());
        }
        for step in &self.steps {
            if !effects.contains(&step.effect) {
                effects.push(step.effect.clone());
            }
        }
        effects
    }

    /// Full ffmpeg argument vector for a video program.
    ///
    /// `-ss` and `-t` are input options, so the trim selects a segment of
    /// the source timeline before any speed change is applied.
    pub fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into()];

        if let Some(trim) = self.trim {
            if trim.start > 0.0 {
                args.extend(["-ss".into(), format_number(trim.start)]);
            }
            args.extend(["-t".into(), format_number(trim.duration)]);
        }

        args.extend(["-i".into(), input.to_string_lossy().into_owned()]);

        if let Some(vf) = self.video_filter() {
            args.extend(["-filter:v".into(), vf]);
        }
        if let Some(af) = self.audio_filter() {
            args.extend(["-filter:a".into(), af]);
        }

        if let OutputSettings::Mp4 {
            video_codec,
            preset,
            crf,
            video_bitrate_kbps,
            audio_codec,
            audio_bitrate_kbps,
            frame_rate,
        } = &self.output
        {
            if let Some(fps) = frame_rate {
                args.extend(["-r".into(), fps.to_string()]);
            }
            args.extend(["-c:v".into(), video_codec.clone()]);
            args.extend(["-preset".into(), preset.clone()]);
            if let Some(crf) = crf {
                args.extend(["-crf".into(), crf.to_string()]);
            }
            if let Some(kbps) = video_bitrate_kbps {
                args.extend([
                    "-b:v".into(),
                    format!("{kbps}k"),
                    "-maxrate".into(),
                    format!("{kbps}k"),
                    "-bufsize".into(),
                    format!("{}k", kbps * 2),
                ]);
            }
            args.extend(["-pix_fmt".into(), "yuv420p".into()]);
            args.extend(["-c:a".into(), audio_codec.clone()]);
            if let Some(kbps) = audio_bitrate_kbps {
                args.extend(["-b:a".into(), format!("{kbps}k")]);
            }
            args.extend(["-movflags".into(), "+faststart".into()]);
        }

        args.push(output.to_string_lossy().into_owned());
        args
    }
}

/// Escape a filter option value for ffmpeg's two parsing passes.
///
/// The option parser splits `k=v` pairs on `:` and the graph parser splits
/// filters on `[],;`; each pass strips one level of backslash escaping and
/// drops unescaped whitespace around a token.
pub fn escape_filter_value(value: &str) -> String {
    let option = escape_with(value, &['\\', '\'', ':'], true);
    escape_with(&option, &['\\', '\'', '[', ']', ',', ';'], false)
}

fn escape_with(value: &str, special: &[char], edge_whitespace: bool) -> String {
    let first = value.find(|c: char| !c.is_whitespace());
    let last = value.rfind(|c: char| !c.is_whitespace());
    let mut out = String::with_capacity(value.len() + 8);
    for (i, c) in value.char_indices() {
        let at_edge = match (first, last) {
            (Some(f), Some(l)) => i < f || i > l,
            _ => true,
        };
        if special.contains(&c) || (edge_whitespace && at_edge && c.is_whitespace()) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Format a float with at most four decimals and no trailing zeros.
pub fn format_number(v: f64) -> String {
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
