use std::sync::Arc;

use crate::models::error::LineError;
use crate::models::format::AudioFormat;
use crate::models::line_info::{LineDirection, LineId};

/// Callback a backend invokes whenever a stream's buffer occupancy or
/// cork state changes, so blocked writers, readers, and drainers re-check.
///
/// Must be called without holding any backend lock: the line may call back
/// into the stream from the woken thread immediately.
pub type StreamNotifier = Arc<dyn Fn() + Send + Sync + 'static>;

/// Parameters for creating a native stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub line: LineId,
    pub name: String,
    pub direction: LineDirection,
    /// Concrete format (sample rate specified).
    pub format: AudioFormat,
    /// Buffer size in bytes, a whole number of frames.
    pub buffer_size: usize,
}

/// Connection to a sound server.
///
/// Implemented by:
/// - `VirtualSoundServer` (in-process, clock-driven; `audio-line-virtual`)
pub trait SoundServer: Send + Sync {
    /// Establish the connection. Fails with `LineUnavailable` if the server
    /// cannot be reached.
    fn connect(&self, app_name: &str, server: Option<&str>) -> Result<(), LineError>;

    /// Tear down the connection and every stream still bound to it.
    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Create a stream bound to this connection. Streams start corked.
    ///
    /// Fails with `LineUnavailable` if the server refuses the format or has
    /// no resources left.
    fn create_stream(
        &self,
        request: StreamRequest,
        notifier: StreamNotifier,
    ) -> Result<Arc<dyn NativeStream>, LineError>;
}

/// A playback or capture channel on the server.
///
/// A stream is owned by exactly one open line. `release` is called once,
/// when that line closes; afterwards the stream is never used for new
/// transfers, and calls from threads still holding a reference must not
/// block.
pub trait NativeStream: Send + Sync {
    /// Pause (`true`) or resume (`false`) the flow of data.
    fn cork(&self, corked: bool) -> Result<(), LineError>;

    fn is_corked(&self) -> bool;

    /// Bytes the stream accepts without blocking (playback).
    fn writable_size(&self) -> usize;

    /// Queue bytes for playback. Returns how many were accepted, at most
    /// `writable_size()`.
    fn write(&self, data: &[u8]) -> Result<usize, LineError>;

    /// Captured bytes available to read (capture).
    fn readable_size(&self) -> usize;

    /// Take up to `buf.len()` captured bytes.
    fn read(&self, buf: &mut [u8]) -> Result<usize, LineError>;

    /// Bytes held in the stream buffer: written but not yet played
    /// (playback) or captured but not yet read (capture).
    fn queued_bytes(&self) -> usize;

    /// Discard everything held in the stream buffer.
    fn flush(&self) -> Result<(), LineError>;

    /// Bytes that have passed through the device since the stream was
    /// created: played for playback, captured for capture.
    fn device_position(&self) -> u64;

    /// Apply a playback gain in `0.0..=1.0` and mute flag.
    fn set_volume(&self, volume: f32, muted: bool) -> Result<(), LineError>;

    /// Disconnect the stream from the server and free its buffers.
    fn release(&self);
}
