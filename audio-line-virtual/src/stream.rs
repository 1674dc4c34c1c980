use std::time::Duration;

use audio_line_core::{
    ByteRingBuffer, LineDirection, LineError, NativeStream, StreamNotifier, StreamRequest,
};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// Snapshot of a virtual stream for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualStreamStats {
    pub id: Uuid,
    pub name: String,
    pub direction: LineDirection,
    pub corked: bool,
    pub released: bool,
    pub queued_bytes: usize,
    pub device_position: u64,
    /// Captured bytes dropped because the reader fell behind.
    pub overruns: u64,
    /// Playback ticks that found the queue short.
    pub underruns: u64,
    pub volume: f32,
    pub muted: bool,
}

struct StreamState {
    buffer: ByteRingBuffer,
    corked: bool,
    released: bool,
    device_position: u64,
    /// Fractional bytes owed by the clock, carried between ticks.
    carry: f64,
    underruns: u64,
    /// Capture signal generator position.
    phase: u64,
    volume: f32,
    muted: bool,
}

/// A stream on the virtual server.
///
/// Playback streams drain their queue at the format's byte rate while
/// uncorked; capture streams fill theirs with a non-silent ramp. Both only
/// move when the server clock calls `advance`.
pub struct VirtualStream {
    id: Uuid,
    request: StreamRequest,
    notifier: StreamNotifier,
    state: Mutex<StreamState>,
}

impl VirtualStream {
    pub(crate) fn new(request: StreamRequest, notifier: StreamNotifier) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(StreamState {
                buffer: ByteRingBuffer::new(request.buffer_size),
                corked: true,
                released: false,
                device_position: 0,
                carry: 0.0,
                underruns: 0,
                phase: 0,
                volume: 1.0,
                muted: false,
            }),
            request,
            notifier,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn stats(&self) -> VirtualStreamStats {
        let state = self.state.lock();
        VirtualStreamStats {
            id: self.id,
            name: self.request.name.clone(),
            direction: self.request.direction,
            corked: state.corked,
            released: state.released,
            queued_bytes: state.buffer.len(),
            device_position: state.device_position,
            overruns: state.buffer.overruns(),
            underruns: state.underruns,
            volume: state.volume,
            muted: state.muted,
        }
    }

    /// Move `elapsed` worth of audio through the device, in whole frames.
    ///
    /// Returns true if any bytes moved. The notifier runs after the stream
    /// lock is released.
    pub(crate) fn advance(&self, elapsed: Duration, time_scale: f64) -> bool {
        let frame_size = self.request.format.frame_size().max(1);
        let byte_rate = self.request.format.byte_rate().unwrap_or(0.0);

        let moved = {
            let mut state = self.state.lock();
            if state.released || state.corked {
                return false;
            }
            state.carry += elapsed.as_secs_f64() * time_scale * byte_rate;
            let frames = (state.carry / frame_size as f64).floor();
            let bytes = frames as usize * frame_size;
            state.carry -= bytes as f64;

            match self.request.direction {
                LineDirection::Playback => {
                    let played = state.buffer.discard(bytes);
                    state.device_position += played as u64;
                    if played < bytes {
                        // An empty queue does not bank time for later.
                        state.carry = 0.0;
                        if bytes > 0 {
                            state.underruns += 1;
                        }
                    }
                    played
                }
                LineDirection::Capture => {
                    let data = ramp(&mut state.phase, bytes);
                    state.buffer.push_overwrite(&data);
                    state.device_position += bytes as u64;
                    bytes
                }
            }
        };

        if moved > 0 {
            (self.notifier)();
        }
        moved > 0
    }

    fn ensure_live(&self, released: bool, operation: &str) -> Result<(), LineError> {
        if released {
            Err(LineError::IllegalState(format!(
                "{} on released stream {}",
                operation, self.request.name
            )))
        } else {
            Ok(())
        }
    }
}

/// Sawtooth over 1..=255 so captured data is never all zeros.
fn ramp(phase: &mut u64, len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| {
            *phase = phase.wrapping_add(1);
            (*phase % 255) as u8 + 1
        })
        .collect()
}

impl NativeStream for VirtualStream {
    fn cork(&self, corked: bool) -> Result<(), LineError> {
        {
            let mut state = self.state.lock();
            self.ensure_live(state.released, "cork")?;
            state.corked = corked;
            if corked {
                state.carry = 0.0;
            }
        }
        (self.notifier)();
        Ok(())
    }

    fn is_corked(&self) -> bool {
        self.state.lock().corked
    }

    fn writable_size(&self) -> usize {
        let state = self.state.lock();
        if state.released {
            0
        } else {
            state.buffer.free()
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize, LineError> {
        let written = {
            let mut state = self.state.lock();
            self.ensure_live(state.released, "write")?;
            state.buffer.write(data)
        };
        (self.notifier)();
        Ok(written)
    }

    fn readable_size(&self) -> usize {
        self.state.lock().buffer.len()
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, LineError> {
        let read = {
            let mut state = self.state.lock();
            self.ensure_live(state.released, "read")?;
            state.buffer.read_into(buf)
        };
        (self.notifier)();
        Ok(read)
    }

    fn queued_bytes(&self) -> usize {
        self.state.lock().buffer.len()
    }

    fn flush(&self) -> Result<(), LineError> {
        {
            let mut state = self.state.lock();
            self.ensure_live(state.released, "flush")?;
            state.buffer.clear();
            state.carry = 0.0;
        }
        (self.notifier)();
        Ok(())
    }

    fn device_position(&self) -> u64 {
        self.state.lock().device_position
    }

    fn set_volume(&self, volume: f32, muted: bool) -> Result<(), LineError> {
        let mut state = self.state.lock();
        self.ensure_live(state.released, "set_volume")?;
        state.volume = volume;
        state.muted = muted;
        Ok(())
    }

    fn release(&self) {
        {
            let mut state = self.state.lock();
            if state.released {
                return;
            }
            state.released = true;
            state.corked = true;
            state.buffer.clear();
        }
        log::debug!("Released virtual stream {} ({})", self.request.name, self.id);
        (self.notifier)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_line_core::{AudioFormat, LineId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn stream(direction: LineDirection) -> (Arc<AtomicUsize>, VirtualStream) {
        let wakeups = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakeups);
        let notifier: StreamNotifier = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let request = StreamRequest {
            line: LineId::new(),
            name: "test".into(),
            direction,
            // 8000 bytes per second.
            format: AudioFormat::pcm_unsigned(8_000, 8, 1),
            buffer_size: 1_000,
        };
        (wakeups, VirtualStream::new(request, notifier))
    }

    #[test]
    fn corked_stream_does_not_move() {
        let (_, s) = stream(LineDirection::Playback);
        s.write(&[1; 100]).unwrap();
        assert!(!s.advance(Duration::from_millis(10), 1.0));
        assert_eq!(s.queued_bytes(), 100);
        assert_eq!(s.device_position(), 0);
    }

    #[test]
    fn playback_consumes_at_byte_rate() {
        let (wakeups, s) = stream(LineDirection::Playback);
        s.write(&[1; 500]).unwrap();
        s.cork(false).unwrap();
        let before = wakeups.load(Ordering::SeqCst);

        assert!(s.advance(Duration::from_millis(10), 1.0));
        assert_eq!(s.device_position(), 80);
        assert_eq!(s.queued_bytes(), 420);
        assert!(wakeups.load(Ordering::SeqCst) > before);

        assert!(s.advance(Duration::from_millis(10), 2.0));
        assert_eq!(s.device_position(), 240);
    }

    #[test]
    fn fractional_bytes_carry_between_ticks() {
        let (_, s) = stream(LineDirection::Playback);
        s.write(&[1; 100]).unwrap();
        s.cork(false).unwrap();
        // 0.1 ms is 0.8 bytes.
        s.advance(Duration::from_micros(100), 1.0);
        assert_eq!(s.device_position(), 0);
        s.advance(Duration::from_micros(100), 1.0);
        assert_eq!(s.device_position(), 1);
    }

    #[test]
    fn playback_never_plays_more_than_queued() {
        let (_, s) = stream(LineDirection::Playback);
        s.write(&[1; 10]).unwrap();
        s.cork(false).unwrap();
        s.advance(Duration::from_secs(1), 1.0);
        assert_eq!(s.device_position(), 10);
        assert_eq!(s.queued_bytes(), 0);
        assert_eq!(s.stats().underruns, 1);

        s.write(&[1; 10]).unwrap();
        s.advance(Duration::from_micros(100), 1.0);
        assert_eq!(s.device_position(), 10);
    }

    #[test]
    fn capture_produces_non_silent_data_and_overwrites() {
        let (_, s) = stream(LineDirection::Capture);
        s.cork(false).unwrap();
        s.advance(Duration::from_millis(100), 1.0);
        assert_eq!(s.device_position(), 800);

        let mut buf = [0u8; 800];
        assert_eq!(s.read(&mut buf).unwrap(), 800);
        assert!(buf.iter().all(|&b| b != 0));

        s.advance(Duration::from_millis(200), 1.0);
        assert_eq!(s.queued_bytes(), 1_000);
        assert_eq!(s.stats().overruns, 600);
    }

    #[test]
    fn released_stream_rejects_transfers() {
        let (_, s) = stream(LineDirection::Playback);
        s.write(&[1; 10]).unwrap();
        s.release();
        s.release();
        assert!(s.is_released());
        assert_eq!(s.queued_bytes(), 0);
        assert_eq!(s.writable_size(), 0);
        assert!(matches!(s.write(&[1]), Err(LineError::IllegalState(_))));
        assert!(matches!(s.cork(false), Err(LineError::IllegalState(_))));
        assert!(!s.advance(Duration::from_secs(1), 1.0));
    }
}
