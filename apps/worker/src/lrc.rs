//! LRC (line-synced lyrics) text format
//!
//! Lines look like `[mm:ss.xx]text`. Rendering always writes centiseconds;
//! parsing also accepts `[mm:ss]`, `[mm:ss.xxx]` and several stamps on one
//! line, and skips ID tags such as `[ar:Artist]`.

use serde::{Deserialize, Serialize};

/// One timed lyric line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrcLine {
    pub time_seconds: f64,
    pub text: String,
}

impl LrcLine {
    pub fn new(time_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            time_seconds,
            text: text.into(),
        }
    }
}

/// Format seconds as an LRC timestamp, e.g. `[01:05.30]`
pub fn format_timestamp(seconds: f64) -> String {
    let centis = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 100.0).round() as u64
    } else {
        0
    };
    format!(
        "[{:02}:{:02}.{:02}]",
        centis / 6000,
        (centis / 100) % 60,
        centis % 100
    )
}

/// Render lines as an LRC document
pub fn render(lines: &[LrcLine]) -> String {
    let mut out = String::with_capacity(lines.len() * 32);
    for line in lines {
        out.push_str(&format_timestamp(line.time_seconds));
        out.push_str(&line.text);
        out.push('\n');
    }
    out
}

/// Parse an LRC document into lines ordered by time
pub fn parse(text: &str) -> Vec<LrcLine> {
    let mut lines = Vec::new();

    for raw in text.lines() {
        let mut rest = raw.trim();
        let mut stamps = Vec::new();

        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(close) = stripped.find(']') else {
                break;
            };
            match parse_timestamp(&stripped[..close]) {
                Some(seconds) => stamps.push(seconds),
                // ID tag or section header
                None => break,
            }
            rest = stripped[close + 1..].trim_start();
        }

        let text = rest.trim();
        for seconds in stamps {
            lines.push(LrcLine::new(seconds, text));
        }
    }

    lines.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
    lines
}

/// Parse `mm:ss`, `mm:ss.xx` or `mm:ss.xxx`
fn parse_timestamp(tag: &str) -> Option<f64> {
    let (minutes, seconds) = tag.split_once(':')?;
    if minutes.is_empty() || !minutes.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (whole, frac) = match seconds.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (seconds, ""),
    };
    if whole.len() != 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || frac.len() > 3
        || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let minutes: f64 = minutes.parse().ok()?;
    let whole: f64 = whole.parse().ok()?;
    let frac: f64 = if frac.is_empty() {
        0.0
    } else {
        frac.parse::<f64>().ok()? / 10f64.powi(frac.len() as i32)
    };
    Some(minutes * 60.0 + whole + frac)
}

/// Sung lines of a lyric sheet: trimmed, non-empty, `[Section]` headers dropped
pub fn lyric_lines(lyrics: &str) -> Vec<String> {
    lyrics
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !(line.starts_with('[') && line.ends_with(']')))
        .map(str::to_string)
        .collect()
}

/// Clamp times to be non-negative and non-decreasing
pub fn make_monotonic(lines: &mut [LrcLine]) {
    let mut floor = 0.0_f64;
    for line in lines.iter_mut() {
        if !line.time_seconds.is_finite() || line.time_seconds < floor {
            line.time_seconds = floor;
        }
        floor = line.time_seconds;
    }
}
