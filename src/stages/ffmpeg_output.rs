//! Parsers for the diagnostic stream ffmpeg writes to stderr.
//!
//! ffmpeg has no stable machine-readable progress on stderr; these patterns
//! match the status line format of ffmpeg 4.x through 7.x:
//!
//! ```text
//! frame=  240 fps= 48 q=-0.0 size=N/A time=00:00:10.01 bitrate=N/A speed=2.01x
//! ```
//!
//! and the `Duration:` header (or the matroska `DURATION` tag) of an input.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

const TIMESTAMP: &str = r"(?P<h>\d{2}):(?P<m>\d{2}):(?P<s>\d{2})\.(?P<cs>\d{2})";

fn frame_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"frame=\s*(?P<frame>\d+)").expect("frame pattern is valid"))
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!("time={}", TIMESTAMP)).expect("time pattern is valid")
    })
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"(?i)duration\s*:\s*{}", TIMESTAMP))
            .expect("duration pattern is valid")
    })
}

fn timestamp(captures: &regex::Captures<'_>) -> Option<Duration> {
    let hours = captures["h"].parse::<u64>().ok()?;
    let minutes = captures["m"].parse::<u64>().ok()?;
    let seconds = captures["s"].parse::<u64>().ok()?;
    let centiseconds = captures["cs"].parse::<u64>().ok()?;
    let whole = Duration::from_secs(hours * 3600 + minutes * 60 + seconds);
    Some(whole + Duration::from_millis(centiseconds * 10))
}

/// Number of frames written so far, from a status line.
pub(crate) fn frame_number(line: &str) -> Option<u64> {
    frame_pattern().captures(line)?["frame"].parse().ok()
}

/// Position of the encoder, from a status line.
pub(crate) fn position(line: &str) -> Option<Duration> {
    timestamp(&time_pattern().captures(line)?)
}

/// Total duration declared by an input header or stream tag.
pub(crate) fn declared_duration(line: &str) -> Option<Duration> {
    timestamp(&duration_pattern().captures(line)?)
}
