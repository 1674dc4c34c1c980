use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::format::AudioFormat;
use super::state::LineState;

/// Identity of a line, stable across reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LineId(Uuid);

impl LineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which way audio flows through a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDirection {
    /// Source line: the application writes, the device plays.
    Playback,
    /// Target line: the device captures, the application reads.
    Capture,
}

impl fmt::Display for LineDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineDirection::Playback => write!(f, "playback"),
            LineDirection::Capture => write!(f, "capture"),
        }
    }
}

/// Description of a kind of line: its direction, the formats it may be
/// opened with, and buffer-size limits.
///
/// Used both to request a line from a mixer and to describe what a mixer
/// offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineInfo {
    pub direction: LineDirection,
    /// Acceptable formats. Empty means "any supported format".
    pub formats: Vec<AudioFormat>,
    pub min_buffer_size: Option<usize>,
    pub max_buffer_size: Option<usize>,
}

impl LineInfo {
    pub fn new(direction: LineDirection) -> Self {
        Self {
            direction,
            formats: Vec::new(),
            min_buffer_size: None,
            max_buffer_size: None,
        }
    }

    pub fn with_format(direction: LineDirection, format: AudioFormat) -> Self {
        Self {
            formats: vec![format],
            ..Self::new(direction)
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.min_buffer_size = Some(buffer_size);
        self.max_buffer_size = Some(buffer_size);
        self
    }

    /// Whether a line described by `offered` can satisfy this request.
    pub fn matches(&self, offered: &LineInfo) -> bool {
        if self.direction != offered.direction {
            return false;
        }
        let formats_ok = self.formats.iter().all(|wanted| {
            offered.formats.is_empty() || offered.formats.iter().any(|f| wanted.matches(f))
        });
        let min_ok = match (self.min_buffer_size, offered.min_buffer_size) {
            (Some(wanted), Some(min)) => wanted >= min,
            _ => true,
        };
        let max_ok = match (self.max_buffer_size, offered.max_buffer_size) {
            (Some(wanted), Some(max)) => wanted <= max,
            _ => true,
        };
        formats_ok && min_ok && max_ok
    }
}

/// Diagnostics snapshot of a single line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStatus {
    pub id: LineId,
    pub name: String,
    pub direction: LineDirection,
    pub state: LineState,
    pub format: AudioFormat,
    pub buffer_size: usize,
    pub frame_position: u64,
    /// Bytes written (playback) or read (capture) since the last open.
    pub bytes_transferred: u64,
    pub open_count: u64,
    pub opened_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleFormat;

    fn offered() -> LineInfo {
        LineInfo {
            direction: LineDirection::Playback,
            formats: vec![SampleFormat::U8.pattern(1), SampleFormat::S16Le.pattern(2)],
            min_buffer_size: Some(64),
            max_buffer_size: Some(1_000_000),
        }
    }

    #[test]
    fn request_without_formats_matches_direction_only() {
        assert!(LineInfo::new(LineDirection::Playback).matches(&offered()));
        assert!(!LineInfo::new(LineDirection::Capture).matches(&offered()));
    }

    #[test]
    fn request_with_format_must_match_an_offered_pattern() {
        let ok = LineInfo::with_format(LineDirection::Playback, AudioFormat::pcm_unsigned(8_000, 8, 1));
        let bad = LineInfo::with_format(LineDirection::Playback, AudioFormat::pcm_unsigned(8_000, 8, 2));
        assert!(ok.matches(&offered()));
        assert!(!bad.matches(&offered()));
    }

    #[test]
    fn buffer_size_must_fall_within_limits() {
        let fmt = AudioFormat::pcm_unsigned(8_000, 8, 1);
        let small = LineInfo::with_format(LineDirection::Playback, fmt).with_buffer_size(10);
        let fine = LineInfo::with_format(LineDirection::Playback, fmt).with_buffer_size(10_000);
        assert!(!small.matches(&offered()));
        assert!(fine.matches(&offered()));
    }
}
