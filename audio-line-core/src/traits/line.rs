use std::sync::Arc;

use crate::line::dispatcher::ListenerId;
use crate::models::error::LineError;
use crate::models::format::AudioFormat;
use crate::models::line_info::{LineDirection, LineId, LineInfo, LineStatus};
use crate::models::state::LineState;
use crate::traits::listener::LineListener;

/// Capabilities shared by every line: identity, open/close, listeners.
///
/// Implemented by:
/// - `SourceDataLine` (playback)
/// - `TargetDataLine` (capture)
pub trait Line: Send + Sync {
    fn id(&self) -> LineId;

    fn name(&self) -> &str;

    fn direction(&self) -> LineDirection;

    /// Description of what this line supports.
    fn info(&self) -> LineInfo;

    /// Open with the line's default format and buffer size.
    ///
    /// Fails with `IllegalState` if the line is already open, and with
    /// `LineUnavailable` if the mixer is not open or the server refuses.
    fn open(&self) -> Result<(), LineError>;

    /// Release the native stream and return to CLOSED. No-op when already
    /// closed. Unblocks any in-flight write, read, or drain.
    fn close(&self);

    fn is_open(&self) -> bool;

    fn add_listener(&self, listener: Arc<dyn LineListener>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// A line that moves audio through a buffer.
pub trait DataLine: Line {
    /// Open with an explicit format and optional buffer size in bytes.
    fn open_with(&self, format: AudioFormat, buffer_size: Option<usize>) -> Result<(), LineError>;

    /// OPEN or STOPPED -> STARTED. No-op when already started.
    fn start(&self) -> Result<(), LineError>;

    /// STARTED -> STOPPED. No-op when open but not started.
    fn stop(&self) -> Result<(), LineError>;

    /// Block until queued playback data has been consumed. On capture,
    /// interrupt readers and wait for the line to leave STARTED.
    fn drain(&self) -> Result<(), LineError>;

    /// Discard buffered data and interrupt in-flight transfers.
    fn flush(&self) -> Result<(), LineError>;

    fn state(&self) -> LineState;

    /// True while STARTED.
    fn is_running(&self) -> bool;

    /// True while STARTED.
    fn is_active(&self) -> bool;

    /// Format of the current (or most recent) open.
    fn format(&self) -> AudioFormat;

    /// Buffer size in bytes of the current (or most recent) open.
    fn buffer_size(&self) -> usize;

    /// Bytes that can be written (playback) or read (capture) without
    /// blocking. Zero when closed.
    fn available(&self) -> usize;

    /// Frames played (playback) or read (capture) since the last open.
    /// Retained after close.
    fn frame_position(&self) -> u64;

    fn microsecond_position(&self) -> u64;

    fn status(&self) -> LineStatus;
}
