//! Clockless sound server for unit tests.
//!
//! Nothing moves on its own: tests drive playback with
//! `ManualStream::consume` and capture with `ManualStream::produce`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::LineError;
use crate::processing::ring_buffer::ByteRingBuffer;
use crate::traits::stream::{NativeStream, SoundServer, StreamNotifier, StreamRequest};

#[derive(Default)]
pub(crate) struct ManualServer {
    connected: AtomicBool,
    refuse: AtomicBool,
    streams: Mutex<Vec<Arc<ManualStream>>>,
    on_create: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ManualServer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub(crate) fn last_stream(&self) -> Arc<ManualStream> {
        Arc::clone(self.streams.lock().last().expect("no stream created"))
    }

    pub(crate) fn streams(&self) -> Vec<Arc<ManualStream>> {
        self.streams.lock().clone()
    }

    /// Run `hook` once, inside the next `create_stream`, after the stream
    /// is created.
    pub(crate) fn on_create_stream(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_create.lock() = Some(Box::new(hook));
    }

    pub(crate) fn released_streams(&self) -> usize {
        self.streams
            .lock()
            .iter()
            .filter(|s| s.release_count() > 0)
            .count()
    }
}

impl SoundServer for ManualServer {
    fn connect(&self, _app_name: &str, _server: Option<&str>) -> Result<(), LineError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(LineError::LineUnavailable("connection refused".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn create_stream(
        &self,
        request: StreamRequest,
        notifier: StreamNotifier,
    ) -> Result<Arc<dyn NativeStream>, LineError> {
        if !self.is_connected() {
            return Err(LineError::LineUnavailable("not connected".into()));
        }
        let stream = Arc::new(ManualStream::new(request, notifier));
        self.streams.lock().push(Arc::clone(&stream));
        let hook = self.on_create.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(stream)
    }
}

struct ManualState {
    buffer: ByteRingBuffer,
    corked: bool,
    position: u64,
    volume: (f32, bool),
}

pub(crate) struct ManualStream {
    request: StreamRequest,
    notifier: StreamNotifier,
    state: Mutex<ManualState>,
    releases: AtomicUsize,
    failing: AtomicBool,
}

impl ManualStream {
    fn new(request: StreamRequest, notifier: StreamNotifier) -> Self {
        Self {
            state: Mutex::new(ManualState {
                buffer: ByteRingBuffer::new(request.buffer_size),
                corked: true,
                position: 0,
                volume: (1.0, false),
            }),
            request,
            notifier,
            releases: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// Play up to `bytes` queued bytes, if uncorked. Returns bytes played.
    pub(crate) fn consume(&self, bytes: usize) -> usize {
        let played = {
            let mut state = self.state.lock();
            if state.corked {
                0
            } else {
                let played = state.buffer.discard(bytes);
                state.position += played as u64;
                played
            }
        };
        (self.notifier)();
        played
    }

    /// Capture `data`, if uncorked.
    pub(crate) fn produce(&self, data: &[u8]) {
        {
            let mut state = self.state.lock();
            if !state.corked {
                state.buffer.push_overwrite(data);
                state.position += data.len() as u64;
            }
        }
        (self.notifier)();
    }

    /// Make every later write and read fail.
    pub(crate) fn fail_transfers(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<(), LineError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(LineError::LineUnavailable("device lost".into()))
        } else {
            Ok(())
        }
    }

    pub(crate) fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn volume(&self) -> (f32, bool) {
        self.state.lock().volume
    }
}

impl NativeStream for ManualStream {
    fn cork(&self, corked: bool) -> Result<(), LineError> {
        self.state.lock().corked = corked;
        (self.notifier)();
        Ok(())
    }

    fn is_corked(&self) -> bool {
        self.state.lock().corked
    }

    fn writable_size(&self) -> usize {
        self.state.lock().buffer.free()
    }

    fn write(&self, data: &[u8]) -> Result<usize, LineError> {
        self.check_failing()?;
        let written = self.state.lock().buffer.write(data);
        (self.notifier)();
        Ok(written)
    }

    fn readable_size(&self) -> usize {
        self.state.lock().buffer.len()
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, LineError> {
        self.check_failing()?;
        let read = self.state.lock().buffer.read_into(buf);
        (self.notifier)();
        Ok(read)
    }

    fn queued_bytes(&self) -> usize {
        self.state.lock().buffer.len()
    }

    fn flush(&self) -> Result<(), LineError> {
        self.state.lock().buffer.clear();
        (self.notifier)();
        Ok(())
    }

    fn device_position(&self) -> u64 {
        self.state.lock().position
    }

    fn set_volume(&self, volume: f32, muted: bool) -> Result<(), LineError> {
        self.state.lock().volume = (volume, muted);
        Ok(())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.state.lock().buffer.clear();
        (self.notifier)();
    }
}
