//! Parsing of ffmpeg's stderr into encode progress.
//!
//! ffmpeg prints the input banner (`Duration: 00:01:02.50, start: ...`) and,
//! with `-progress pipe:2`, `key=value` blocks terminated by a
//! `progress=continue|end` line. [`FfmpegProgress`] folds those lines into a
//! running percentage of the expected output duration.

/// Parse the `Duration: HH:MM:SS.cc` field of an ffmpeg input banner line.
pub fn parse_banner_duration(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.trim_start().split(',').next()?.trim();
    parse_timestamp(stamp)
}

/// Parse `HH:MM:SS(.frac)` into seconds.
pub fn parse_timestamp(stamp: &str) -> Option<f64> {
    let mut parts = stamp.split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Stateful line folder for one ffmpeg run.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    /// Expected output duration in seconds.
    expected: Option<f64>,
    last_out_time_us: Option<i64>,
    finished: bool,
}

impl FfmpegProgress {
    /// `expected` is the output duration when known up front (an explicit
    /// trim); otherwise it is taken from the input banner, scaled by
    /// `time_scale` (`1 / speed`) so a sped-up output still ends at 100%.
    pub fn new(expected: Option<f64>) -> Self {
        Self {
            expected,
            ..Default::default()
        }
    }

    pub fn expected_secs(&self) -> Option<f64> {
        self.expected
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one stderr line. Returns a percentage (0..=100) at the end of
    /// each progress block once the expected duration is known.
    pub fn feed(&mut self, line: &str, time_scale: f64) -> Option<f32> {
        let line = line.trim();
        if self.expected.is_none() {
            if let Some(secs) = parse_banner_duration(line) {
                self.expected = Some(secs * time_scale);
                return None;
            }
        }
        if let Some(val) = line.strip_prefix("out_time_us=") {
            self.last_out_time_us = val.trim().parse::<i64>().ok();
            return None;
        }
        if let Some(state) = line.strip_prefix("progress=") {
            if state == "end" {
                self.finished = true;
                return Some(100.0);
            }
            let out_us = self.last_out_time_us?;
            let total = self.expected.filter(|d| *d > 0.0)?;
            let pct = (out_us as f64 / 1_000_000.0 / total).clamp(0.0, 1.0) * 100.0;
            return Some(pct as f32);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_duration() {
        let line = "  Duration: 00:01:02.50, start: 0.000000, bitrate: 1205 kb/s";
        assert_eq!(parse_banner_duration(line), Some(62.5));
        assert_eq!(parse_banner_duration("Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_banner_duration("Stream #0:0: Video"), None);
    }

    #[test]
    fn timestamp_forms() {
        assert_eq!(parse_timestamp("01:00:00"), Some(3600.0));
        assert_eq!(parse_timestamp("00:00:01.25"), Some(1.25));
        assert_eq!(parse_timestamp("1:2"), None);
        assert_eq!(parse_timestamp("00:00:00:00"), None);
    }

    #[test]
    fn progress_from_banner_and_blocks() {
        let mut p = FfmpegProgress::new(None);
        assert_eq!(p.feed("  Duration: 00:00:10.00, start: 0.0", 1.0), None);
        assert_eq!(p.feed("frame=12", 1.0), None);
        assert_eq!(p.feed("out_time_us=2500000", 1.0), None);
        assert_eq!(p.feed("progress=continue", 1.0), Some(25.0));
        p.feed("out_time_us=99000000", 1.0);
        assert_eq!(p.feed("progress=continue", 1.0), Some(100.0));
        assert_eq!(p.feed("progress=end", 1.0), Some(100.0));
        assert!(p.is_finished());
    }

    #[test]
    fn explicit_expected_duration_wins_over_banner() {
        let mut p = FfmpegProgress::new(Some(2.0));
        p.feed("Duration: 00:00:10.00, start: 0.0", 1.0);
        assert_eq!(p.expected_secs(), Some(2.0));
        p.feed("out_time_us=1000000", 1.0);
        assert_eq!(p.feed("progress=continue", 1.0), Some(50.0));
    }

    #[test]
    fn speed_scales_banner_duration() {
        let mut p = FfmpegProgress::new(None);
        p.feed("Duration: 00:00:10.00, start: 0.0", 0.5);
        assert_eq!(p.expected_secs(), Some(5.0));
    }

    #[test]
    fn no_duration_means_no_percentage() {
        let mut p = FfmpegProgress::new(None);
        p.feed("out_time_us=1000000", 1.0);
        assert_eq!(p.feed("progress=continue", 1.0), None);
    }
}
