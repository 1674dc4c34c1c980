use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex};

use crate::line::dispatcher::{EventDispatcher, ListenerId};
use crate::line::signal::Signal;
use crate::line::AnyLine;
use crate::mixer::MixerShared;
use crate::models::config::MixerConfiguration;
use crate::models::error::LineError;
use crate::models::event::{LineEvent, LineEventKind};
use crate::models::format::{self, AudioFormat};
use crate::models::line_info::{LineDirection, LineId, LineInfo, LineStatus};
use crate::models::state::LineState;
use crate::processing::transfer;
use crate::traits::listener::LineListener;
use crate::traits::stream::{NativeStream, StreamRequest};

/// Mutable line state, protected by `parking_lot::Mutex`.
struct LineInner {
    state: LineState,
    stream: Option<Arc<dyn NativeStream>>,
    format: AudioFormat,
    buffer_size: usize,
    /// Bumped on every open and close.
    generation: u64,
    /// Bumped whenever in-flight transfers must return early.
    interrupts: u64,
    /// Position reported while no stream is bound.
    frozen_position: u64,
    frames_read: u64,
    bytes_transferred: u64,
    open_count: u64,
    opened_at: Option<DateTime<Utc>>,
    volume: f32,
    muted: bool,
}

/// A transfer's view of the line as it was when the call began.
struct Ticket {
    stream: Arc<dyn NativeStream>,
    generation: u64,
    interrupts: u64,
    frame_size: usize,
}

impl Ticket {
    fn interrupted(&self, inner: &LineInner) -> bool {
        inner.generation != self.generation || inner.interrupts != self.interrupts
    }
}

/// Lifecycle state machine shared by playback and capture lines.
///
/// ```text
///            open                start
///  CLOSED ─────────▶ OPEN ─────────────▶ STARTED
///    ▲                │  ▲                 │
///    │     close      │  │ start      stop │
///    └────────────────┘  └──── STOPPED ◀───┘
///    ▲                             │
///    └──────────── close ──────────┘
/// ```
///
/// Transitions are serialized by a reentrant transition lock that stays held
/// while listeners run, so events are delivered in transition order and a
/// listener may call back into the line. Blocking transfers never hold the
/// transition lock; they wait on a `Signal` the backend pokes and re-check
/// the generation and interrupt counters each time they wake.
pub(crate) struct LineCore {
    id: LineId,
    name: String,
    direction: LineDirection,
    default_format: AudioFormat,
    mixer: Weak<MixerShared>,
    config: MixerConfiguration,
    transition: ReentrantMutex<()>,
    inner: Mutex<LineInner>,
    signal: Arc<Signal>,
    dispatcher: EventDispatcher,
}

impl LineCore {
    pub(crate) fn new(
        mixer: &Arc<MixerShared>,
        direction: LineDirection,
        default_format: AudioFormat,
    ) -> Arc<Self> {
        let id = LineId::new();
        let config = mixer.config.clone();
        let buffer_size = config
            .buffer
            .resolve(None, default_format.frame_size())
            .unwrap_or(config.buffer.default_size);
        let short_id: String = id.to_string().chars().take(8).collect();

        Arc::new(Self {
            id,
            name: format!("{}-{}", direction, short_id),
            direction,
            default_format,
            mixer: Arc::downgrade(mixer),
            dispatcher: EventDispatcher::new(config.listener_warn_threshold()),
            config,
            transition: ReentrantMutex::new(()),
            inner: Mutex::new(LineInner {
                state: LineState::Closed,
                stream: None,
                format: default_format,
                buffer_size,
                generation: 0,
                interrupts: 0,
                frozen_position: 0,
                frames_read: 0,
                bytes_transferred: 0,
                open_count: 0,
                opened_at: None,
                volume: 1.0,
                muted: false,
            }),
            signal: Arc::new(Signal::new()),
        })
    }

    pub(crate) fn id(&self) -> LineId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn direction(&self) -> LineDirection {
        self.direction
    }

    pub(crate) fn info(&self) -> LineInfo {
        LineInfo {
            direction: self.direction,
            formats: format::supported_formats(),
            min_buffer_size: Some(self.config.buffer.min_size),
            max_buffer_size: Some(self.config.buffer.max_size),
        }
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn LineListener>) -> ListenerId {
        self.dispatcher.add(listener)
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        self.dispatcher.remove(id)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    pub(crate) fn open(self: &Arc<Self>) -> Result<(), LineError> {
        self.open_with(self.default_format, None)
    }

    pub(crate) fn open_with(
        self: &Arc<Self>,
        format: AudioFormat,
        buffer_size: Option<usize>,
    ) -> Result<(), LineError> {
        let _transition = self.transition.lock();
        if !self.inner.lock().state.is_closed() {
            return Err(LineError::IllegalState(format!("line {} is already open", self.name)));
        }

        let mixer = self
            .mixer
            .upgrade()
            .ok_or_else(|| LineError::LineUnavailable("mixer no longer exists".into()))?;
        if !mixer.registry.is_mixer_open() {
            return Err(LineError::LineUnavailable("mixer is not open".into()));
        }
        format.validate_for_open().map_err(LineError::LineUnavailable)?;
        let buffer_size = self.config.buffer.resolve(buffer_size, format.frame_size())?;

        let request = StreamRequest {
            line: self.id,
            name: self.name.clone(),
            direction: self.direction,
            format,
            buffer_size,
        };
        let stream = mixer.server.create_stream(request, self.signal.notifier())?;

        if self.direction == LineDirection::Playback {
            let (volume, muted) = {
                let inner = self.inner.lock();
                (inner.volume, inner.muted)
            };
            if let Err(e) = stream.set_volume(volume, muted) {
                log::warn!("Failed to apply volume to {}: {}", self.name, e);
            }
        }

        {
            let mut inner = self.inner.lock();
            if !mixer.registry.try_insert(AnyLine::from_core(Arc::clone(self))) {
                drop(inner);
                stream.release();
                return Err(LineError::LineUnavailable(
                    "mixer closed while the line was opening".into(),
                ));
            }
            inner.state = LineState::Open;
            inner.stream = Some(stream);
            inner.format = format;
            inner.buffer_size = buffer_size;
            inner.generation += 1;
            inner.frozen_position = 0;
            inner.frames_read = 0;
            inner.bytes_transferred = 0;
            inner.open_count += 1;
            inner.opened_at = Some(Utc::now());
        }
        self.signal.notify();

        log::debug!(
            "Opened {} ({}, {} byte buffer)",
            self.name,
            format,
            buffer_size
        );
        self.fire(LineEventKind::Open, 0);
        Ok(())
    }

    pub(crate) fn start(&self) -> Result<(), LineError> {
        let _transition = self.transition.lock();
        let stream = {
            let inner = self.inner.lock();
            match inner.state {
                LineState::Closed => return Err(LineError::closed("start")),
                LineState::Started => return Ok(()),
                LineState::Open | LineState::Stopped => inner.stream.clone(),
            }
        };
        let stream = stream.ok_or_else(|| LineError::closed("start"))?;
        stream.cork(false).map_err(|e| {
            log::error!("Failed to uncork {}: {}", self.name, e);
            e
        })?;

        let position = {
            let mut inner = self.inner.lock();
            inner.state = LineState::Started;
            self.position_locked(&inner)
        };
        self.signal.notify();

        log::debug!("Started {}", self.name);
        self.fire(LineEventKind::Start, position);
        Ok(())
    }

    pub(crate) fn stop(&self) -> Result<(), LineError> {
        let _transition = self.transition.lock();
        let stream = {
            let inner = self.inner.lock();
            match inner.state {
                LineState::Closed => return Err(LineError::closed("stop")),
                LineState::Open | LineState::Stopped => return Ok(()),
                LineState::Started => inner.stream.clone(),
            }
        };
        let stream = stream.ok_or_else(|| LineError::closed("stop"))?;
        stream.cork(true).map_err(|e| {
            log::error!("Failed to cork {}: {}", self.name, e);
            e
        })?;

        let position = {
            let mut inner = self.inner.lock();
            inner.state = LineState::Stopped;
            inner.interrupts += 1;
            self.position_locked(&inner)
        };
        self.signal.notify();

        log::debug!("Stopped {} at frame {}", self.name, position);
        self.fire(LineEventKind::Stop, position);
        Ok(())
    }

    pub(crate) fn close(&self) {
        let _transition = self.transition.lock();
        let (stream, position) = {
            let mut inner = self.inner.lock();
            if inner.state.is_closed() {
                return;
            }
            let position = self.position_locked(&inner);
            let stream = inner.stream.take();
            inner.state = LineState::Closed;
            inner.generation += 1;
            inner.interrupts += 1;
            inner.frozen_position = position;
            if let Some(mixer) = self.mixer.upgrade() {
                mixer.registry.remove(self.id);
            }
            (stream, position)
        };
        self.signal.notify();

        if let Some(stream) = stream {
            stream.release();
        }

        log::debug!("Closed {} at frame {}", self.name, position);
        self.fire(LineEventKind::Close, position);
    }

    // ── Buffer control ──────────────────────────────────────────────

    pub(crate) fn drain(&self) -> Result<(), LineError> {
        let ticket = self.ticket("drain")?;
        match self.direction {
            LineDirection::Playback => loop {
                let seen = self.signal.sequence();
                if self.inner.lock().generation != ticket.generation {
                    return Ok(());
                }
                if ticket.stream.queued_bytes() == 0 {
                    return Ok(());
                }
                self.signal.wait_past(seen, self.config.wait_slice());
            },
            LineDirection::Capture => {
                {
                    let mut inner = self.inner.lock();
                    if !inner.state.is_active() {
                        return Ok(());
                    }
                    inner.interrupts += 1;
                }
                self.signal.notify();
                loop {
                    let seen = self.signal.sequence();
                    {
                        let inner = self.inner.lock();
                        if inner.generation != ticket.generation || !inner.state.is_active() {
                            return Ok(());
                        }
                    }
                    self.signal.wait_past(seen, self.config.wait_slice());
                }
            }
        }
    }

    pub(crate) fn flush(&self) -> Result<(), LineError> {
        let _transition = self.transition.lock();
        let ticket = self.ticket("flush")?;
        ticket.stream.flush()?;
        self.inner.lock().interrupts += 1;
        self.signal.notify();
        log::debug!("Flushed {}", self.name);
        Ok(())
    }

    // ── Transfers ───────────────────────────────────────────────────

    /// Queue `length` bytes of `buffer` from `offset` for playback.
    ///
    /// Blocks while the stream is full. Returns early with the count
    /// written so far when the line is stopped, flushed, or closed, or when
    /// the stream fails after some bytes were already queued.
    pub(crate) fn write(&self, buffer: &[u8], offset: i64, length: i64) -> Result<usize, LineError> {
        let ticket = self.ticket("write")?;
        let range = transfer::checked_range(buffer.len(), offset, length, ticket.frame_size)?;
        let data = &buffer[range];

        let mut written = 0;
        while written < data.len() {
            let seen = self.signal.sequence();
            let accepted = {
                let mut inner = self.inner.lock();
                if ticket.interrupted(&inner) {
                    break;
                }
                let writable = transfer::align_to_frames(ticket.stream.writable_size(), ticket.frame_size)
                    .min(data.len() - written);
                if writable == 0 {
                    0
                } else {
                    let n = match ticket.stream.write(&data[written..written + writable]) {
                        Ok(n) => n,
                        Err(e) if written > 0 => {
                            log::error!("Write on {} failed after {} bytes: {}", self.name, written, e);
                            break;
                        }
                        Err(e) => return Err(e),
                    };
                    inner.bytes_transferred += n as u64;
                    n
                }
            };
            if accepted == 0 {
                self.signal.wait_past(seen, self.config.wait_slice());
            } else {
                written += accepted;
            }
        }

        if written < data.len() {
            log::debug!(
                "Write on {} interrupted after {} of {} bytes",
                self.name,
                written,
                data.len()
            );
        }
        Ok(written)
    }

    /// Fill `length` bytes of `buffer` from `offset` with captured audio.
    ///
    /// Returns 0 immediately unless the line is started. Blocks until the
    /// range is full, or returns early with the count read so far when the
    /// line is stopped, drained, flushed, or closed.
    pub(crate) fn read(&self, buffer: &mut [u8], offset: i64, length: i64) -> Result<usize, LineError> {
        let ticket = self.ticket("read")?;
        let range = transfer::checked_range(buffer.len(), offset, length, ticket.frame_size)?;
        let out = &mut buffer[range];

        let mut read = 0;
        while read < out.len() {
            let seen = self.signal.sequence();
            let got = {
                let mut inner = self.inner.lock();
                if ticket.interrupted(&inner) || !inner.state.is_active() {
                    break;
                }
                let readable = transfer::align_to_frames(ticket.stream.readable_size(), ticket.frame_size)
                    .min(out.len() - read);
                if readable == 0 {
                    0
                } else {
                    let n = match ticket.stream.read(&mut out[read..read + readable]) {
                        Ok(n) => n,
                        Err(e) if read > 0 => {
                            log::error!("Read on {} failed after {} bytes: {}", self.name, read, e);
                            break;
                        }
                        Err(e) => return Err(e),
                    };
                    inner.bytes_transferred += n as u64;
                    inner.frames_read += transfer::bytes_to_frames(n as u64, ticket.frame_size);
                    n
                }
            };
            if got == 0 {
                self.signal.wait_past(seen, self.config.wait_slice());
            } else {
                read += got;
            }
        }
        Ok(read)
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub(crate) fn state(&self) -> LineState {
        self.inner.lock().state
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state().is_open()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub(crate) fn format(&self) -> AudioFormat {
        self.inner.lock().format
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.inner.lock().buffer_size
    }

    pub(crate) fn available(&self) -> usize {
        let inner = self.inner.lock();
        let Some(stream) = inner.stream.as_ref() else {
            return 0;
        };
        let bytes = match self.direction {
            LineDirection::Playback => stream.writable_size(),
            LineDirection::Capture => stream.readable_size(),
        };
        transfer::align_to_frames(bytes, inner.format.frame_size())
    }

    pub(crate) fn frame_position(&self) -> u64 {
        let inner = self.inner.lock();
        self.position_locked(&inner)
    }

    pub(crate) fn microsecond_position(&self) -> u64 {
        let inner = self.inner.lock();
        transfer::frames_to_micros(self.position_locked(&inner), inner.format.frame_rate())
    }

    pub(crate) fn status(&self) -> LineStatus {
        let inner = self.inner.lock();
        LineStatus {
            id: self.id,
            name: self.name.clone(),
            direction: self.direction,
            state: inner.state,
            format: inner.format,
            buffer_size: inner.buffer_size,
            frame_position: self.position_locked(&inner),
            bytes_transferred: inner.bytes_transferred,
            open_count: inner.open_count,
            opened_at: inner.opened_at,
        }
    }

    // ── Volume (playback) ───────────────────────────────────────────

    pub(crate) fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    pub(crate) fn is_muted(&self) -> bool {
        self.inner.lock().muted
    }

    /// Remembered across reopen; applied to the stream immediately when open.
    pub(crate) fn set_volume(&self, volume: f32) -> Result<(), LineError> {
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(LineError::InvalidArgument(format!(
                "volume {} outside 0.0..=1.0",
                volume
            )));
        }
        let (stream, muted) = {
            let mut inner = self.inner.lock();
            inner.volume = volume;
            (inner.stream.clone(), inner.muted)
        };
        match stream {
            Some(stream) => stream.set_volume(volume, muted),
            None => Ok(()),
        }
    }

    pub(crate) fn set_muted(&self, muted: bool) -> Result<(), LineError> {
        let (stream, volume) = {
            let mut inner = self.inner.lock();
            inner.muted = muted;
            (inner.stream.clone(), inner.volume)
        };
        match stream {
            Some(stream) => stream.set_volume(volume, muted),
            None => Ok(()),
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn ticket(&self, operation: &str) -> Result<Ticket, LineError> {
        let inner = self.inner.lock();
        let stream = inner
            .stream
            .clone()
            .ok_or_else(|| LineError::closed(operation))?;
        Ok(Ticket {
            stream,
            generation: inner.generation,
            interrupts: inner.interrupts,
            frame_size: inner.format.frame_size(),
        })
    }

    /// Playback counts frames the device has consumed; capture counts frames
    /// handed to the reader. Neither moves while the stream is corked.
    fn position_locked(&self, inner: &LineInner) -> u64 {
        match (&inner.stream, self.direction) {
            (None, _) => inner.frozen_position,
            (Some(_), LineDirection::Capture) => inner.frames_read,
            (Some(stream), LineDirection::Playback) => {
                transfer::bytes_to_frames(stream.device_position(), inner.format.frame_size())
            }
        }
    }

    fn fire(&self, kind: LineEventKind, frame_position: u64) {
        self.dispatcher
            .dispatch(&LineEvent::for_line(self.id, kind, frame_position));
    }
}

impl fmt::Debug for LineCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("state", &self.inner.try_lock().map(|inner| inner.state))
            .finish()
    }
}
