use std::fmt;

use serde::{Deserialize, Serialize};

/// Line lifecycle state machine.
///
/// State transitions:
/// ```text
/// closed → open → started ⇄ stopped
///   ↑        │       │         │
///   └────────┴───────┴─────────┘  (close)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineState {
    #[default]
    Closed,
    Open,
    Started,
    Stopped,
}

impl LineState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// True in every state except `Closed`.
    pub fn is_open(&self) -> bool {
        !self.is_closed()
    }

    /// True while the stream is uncorked and data flows.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started)
    }
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineState::Closed => write!(f, "closed"),
            LineState::Open => write!(f, "open"),
            LineState::Started => write!(f, "started"),
            LineState::Stopped => write!(f, "stopped"),
        }
    }
}
