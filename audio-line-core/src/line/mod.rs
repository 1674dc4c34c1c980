//! Playback and capture lines.
//!
//! `SourceDataLine` and `TargetDataLine` are cheap, cloneable handles onto a
//! shared `LineCore`. `AnyLine` is what the mixer hands back for a generic
//! `LineInfo` request and what its registry stores.

pub(crate) mod core;
pub mod dispatcher;
pub(crate) mod signal;

use std::sync::Arc;

use crate::models::error::LineError;
use crate::models::format::AudioFormat;
use crate::models::line_info::{LineDirection, LineId, LineInfo, LineStatus};
use crate::models::state::LineState;
use crate::traits::line::{DataLine, Line};
use crate::traits::listener::LineListener;

use self::core::LineCore;
use self::dispatcher::ListenerId;

/// Forward `Line` and `DataLine` to the `LineCore` behind `core()`.
macro_rules! delegate_data_line {
    ($ty:ty) => {
        impl Line for $ty {
            fn id(&self) -> LineId {
                self.core().id()
            }

            fn name(&self) -> &str {
                self.core().name()
            }

            fn direction(&self) -> LineDirection {
                self.core().direction()
            }

            fn info(&self) -> LineInfo {
                self.core().info()
            }

            fn open(&self) -> Result<(), LineError> {
                self.core().open()
            }

            fn close(&self) {
                self.core().close()
            }

            fn is_open(&self) -> bool {
                self.core().is_open()
            }

            fn add_listener(&self, listener: Arc<dyn LineListener>) -> ListenerId {
                self.core().add_listener(listener)
            }

            fn remove_listener(&self, id: ListenerId) -> bool {
                self.core().remove_listener(id)
            }
        }

        impl DataLine for $ty {
            fn open_with(&self, format: AudioFormat, buffer_size: Option<usize>) -> Result<(), LineError> {
                self.core().open_with(format, buffer_size)
            }

            fn start(&self) -> Result<(), LineError> {
                self.core().start()
            }

            fn stop(&self) -> Result<(), LineError> {
                self.core().stop()
            }

            fn drain(&self) -> Result<(), LineError> {
                self.core().drain()
            }

            fn flush(&self) -> Result<(), LineError> {
                self.core().flush()
            }

            fn state(&self) -> LineState {
                self.core().state()
            }

            fn is_running(&self) -> bool {
                self.core().is_active()
            }

            fn is_active(&self) -> bool {
                self.core().is_active()
            }

            fn format(&self) -> AudioFormat {
                self.core().format()
            }

            fn buffer_size(&self) -> usize {
                self.core().buffer_size()
            }

            fn available(&self) -> usize {
                self.core().available()
            }

            fn frame_position(&self) -> u64 {
                self.core().frame_position()
            }

            fn microsecond_position(&self) -> u64 {
                self.core().microsecond_position()
            }

            fn status(&self) -> LineStatus {
                self.core().status()
            }
        }
    };
}

/// Playback line: the application writes, the server plays.
#[derive(Debug, Clone)]
pub struct SourceDataLine {
    core: Arc<LineCore>,
}

impl SourceDataLine {
    pub(crate) fn from_core(core: Arc<LineCore>) -> Self {
        Self { core }
    }

    fn core(&self) -> &Arc<LineCore> {
        &self.core
    }

    /// Queue the whole of `data`. See [`SourceDataLine::write_from`].
    pub fn write(&self, data: &[u8]) -> Result<usize, LineError> {
        self.core().write(data, 0, data.len() as i64)
    }

    /// Queue `length` bytes of `buffer` starting at `offset`.
    ///
    /// Blocks until everything is queued. Returns fewer bytes if the line
    /// is stopped, flushed, or closed meanwhile.
    ///
    /// Errors:
    /// - `IllegalState` if the line is closed
    /// - `InvalidArgument` for a negative length or a partial frame
    /// - `IndexOutOfBounds` if the range falls outside `buffer`
    pub fn write_from(&self, buffer: &[u8], offset: i64, length: i64) -> Result<usize, LineError> {
        self.core().write(buffer, offset, length)
    }

    pub fn volume(&self) -> f32 {
        self.core().volume()
    }

    /// Gain in `0.0..=1.0`.
    pub fn set_volume(&self, volume: f32) -> Result<(), LineError> {
        self.core().set_volume(volume)
    }

    pub fn is_muted(&self) -> bool {
        self.core().is_muted()
    }

    pub fn set_muted(&self, muted: bool) -> Result<(), LineError> {
        self.core().set_muted(muted)
    }
}

delegate_data_line!(SourceDataLine);

/// Capture line: the server records, the application reads.
#[derive(Debug, Clone)]
pub struct TargetDataLine {
    core: Arc<LineCore>,
}

impl TargetDataLine {
    pub(crate) fn from_core(core: Arc<LineCore>) -> Self {
        Self { core }
    }

    fn core(&self) -> &Arc<LineCore> {
        &self.core
    }

    /// Fill the whole of `buf`. See [`TargetDataLine::read_into`].
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, LineError> {
        let len = buf.len() as i64;
        self.core().read(buf, 0, len)
    }

    /// Fill `length` bytes of `buffer` starting at `offset`.
    ///
    /// Returns 0 at once unless the line is started. Otherwise blocks until
    /// the range is full, returning fewer bytes if the line is stopped,
    /// drained, flushed, or closed meanwhile.
    pub fn read_into(&self, buffer: &mut [u8], offset: i64, length: i64) -> Result<usize, LineError> {
        self.core().read(buffer, offset, length)
    }
}

delegate_data_line!(TargetDataLine);

/// A line of either direction.
#[derive(Debug, Clone)]
pub enum AnyLine {
    Source(SourceDataLine),
    Target(TargetDataLine),
}

impl AnyLine {
    pub(crate) fn from_core(core: Arc<LineCore>) -> Self {
        match core.direction() {
            LineDirection::Playback => AnyLine::Source(SourceDataLine::from_core(core)),
            LineDirection::Capture => AnyLine::Target(TargetDataLine::from_core(core)),
        }
    }

    pub fn as_source(&self) -> Option<&SourceDataLine> {
        match self {
            AnyLine::Source(line) => Some(line),
            AnyLine::Target(_) => None,
        }
    }

    pub fn as_target(&self) -> Option<&TargetDataLine> {
        match self {
            AnyLine::Target(line) => Some(line),
            AnyLine::Source(_) => None,
        }
    }

    fn core(&self) -> &Arc<LineCore> {
        match self {
            AnyLine::Source(line) => &line.core,
            AnyLine::Target(line) => &line.core,
        }
    }
}

impl From<SourceDataLine> for AnyLine {
    fn from(line: SourceDataLine) -> Self {
        AnyLine::Source(line)
    }
}

impl From<TargetDataLine> for AnyLine {
    fn from(line: TargetDataLine) -> Self {
        AnyLine::Target(line)
    }
}

delegate_data_line!(AnyLine);
