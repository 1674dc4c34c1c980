use std::fmt;

use serde::Serialize;

use super::line_info::LineId;

/// Kind of lifecycle transition an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEventKind {
    Open,
    Close,
    Start,
    Stop,
}

impl fmt::Display for LineEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineEventKind::Open => write!(f, "OPEN"),
            LineEventKind::Close => write!(f, "CLOSE"),
            LineEventKind::Start => write!(f, "START"),
            LineEventKind::Stop => write!(f, "STOP"),
        }
    }
}

/// What changed state: a line, or the mixer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventSource {
    Line(LineId),
    Mixer,
}

/// Immutable record of a state transition, delivered synchronously to
/// listeners and then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineEvent {
    pub source: EventSource,
    pub kind: LineEventKind,
    /// Frame position of the line at the moment of the transition; `None`
    /// for mixer events.
    pub frame_position: Option<u64>,
}

impl LineEvent {
    pub fn for_line(line: LineId, kind: LineEventKind, frame_position: u64) -> Self {
        Self {
            source: EventSource::Line(line),
            kind,
            frame_position: Some(frame_position),
        }
    }

    pub fn for_mixer(kind: LineEventKind) -> Self {
        Self {
            source: EventSource::Mixer,
            kind,
            frame_position: None,
        }
    }
}
