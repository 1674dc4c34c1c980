use parking_lot::Mutex;

use crate::line::{AnyLine, SourceDataLine, TargetDataLine};
use crate::models::line_info::LineId;
use crate::traits::line::Line;

/// The mixer's set of currently open lines.
///
/// A line is present exactly while it is open: it is inserted under the
/// line's own state lock as it enters OPEN and removed the same way as it
/// enters CLOSED. Insertion is refused once the mixer has closed, so a line
/// cannot slip in while the mixer is shutting down.
#[derive(Debug, Default)]
pub struct OpenLineRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    mixer_open: bool,
    lines: Vec<AnyLine>,
}

impl OpenLineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_mixer_open(&self, open: bool) {
        self.inner.lock().mixer_open = open;
    }

    pub(crate) fn is_mixer_open(&self) -> bool {
        self.inner.lock().mixer_open
    }

    /// Returns false, leaving the registry unchanged, if the mixer is closed.
    pub(crate) fn try_insert(&self, line: AnyLine) -> bool {
        let mut inner = self.inner.lock();
        if !inner.mixer_open {
            return false;
        }
        if !inner.lines.iter().any(|l| l.id() == line.id()) {
            inner.lines.push(line);
        }
        true
    }

    pub(crate) fn remove(&self, id: LineId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.lines.len();
        inner.lines.retain(|l| l.id() != id);
        inner.lines.len() != before
    }

    pub fn contains(&self, id: LineId) -> bool {
        self.inner.lock().lines.iter().any(|l| l.id() == id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lines.is_empty()
    }

    /// Open lines at the moment of the call, in open order.
    pub fn snapshot(&self) -> Vec<AnyLine> {
        self.inner.lock().lines.clone()
    }

    pub fn source_lines(&self) -> Vec<SourceDataLine> {
        self.inner
            .lock()
            .lines
            .iter()
            .filter_map(|l| l.as_source().cloned())
            .collect()
    }

    pub fn target_lines(&self) -> Vec<TargetDataLine> {
        self.inner
            .lock()
            .lines
            .iter()
            .filter_map(|l| l.as_target().cloned())
            .collect()
    }
}
