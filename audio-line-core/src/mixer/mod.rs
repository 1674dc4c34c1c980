//! Mixer: connection owner, line factory, and registry of open lines.
//!
//! Lines hold a weak reference to the mixer's shared state. Opening a line
//! requires the mixer to be open; closing the mixer closes every line it
//! still has open.

pub mod registry;

use std::sync::Arc;

use parking_lot::ReentrantMutex;
use serde::Serialize;

use crate::line::core::LineCore;
use crate::line::dispatcher::{EventDispatcher, ListenerId};
use crate::line::{AnyLine, SourceDataLine, TargetDataLine};
use crate::models::config::MixerConfiguration;
use crate::models::error::LineError;
use crate::models::event::{LineEvent, LineEventKind};
use crate::models::format::{self, AudioFormat};
use crate::models::line_info::{LineDirection, LineInfo};
use crate::traits::line::Line;
use crate::traits::listener::LineListener;
use crate::traits::stream::SoundServer;

use self::registry::OpenLineRegistry;

/// Descriptive information about a mixer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MixerInfo {
    pub name: String,
    pub vendor: String,
    pub description: String,
    pub version: String,
}

impl Default for MixerInfo {
    fn default() -> Self {
        Self {
            name: "audio-line".into(),
            vendor: "audio-line".into(),
            description: "Sound server mixer".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// State shared between a mixer and the lines it created.
pub(crate) struct MixerShared {
    pub(crate) info: MixerInfo,
    pub(crate) server: Arc<dyn SoundServer>,
    pub(crate) config: MixerConfiguration,
    pub(crate) registry: OpenLineRegistry,
    dispatcher: EventDispatcher,
    transition: ReentrantMutex<()>,
}

/// Entry point: owns the sound-server connection and hands out lines.
///
/// ```text
/// Mixer::new(server, config)
///   .open()                 → connects, fires OPEN
///   .source_data_line(fmt)  → SourceDataLine (CLOSED)
///   .get_line(&info)        → AnyLine matching a LineInfo request
///   .open_lines()           → snapshot of the registry
///   .close()                → closes every open line, disconnects, fires CLOSE
/// ```
pub struct Mixer {
    shared: Arc<MixerShared>,
}

impl Mixer {
    /// Fails with `ConfigurationFailed` if `config` is invalid.
    pub fn new(server: Arc<dyn SoundServer>, config: MixerConfiguration) -> Result<Self, LineError> {
        Self::with_info(server, config, MixerInfo::default())
    }

    pub fn with_info(
        server: Arc<dyn SoundServer>,
        config: MixerConfiguration,
        info: MixerInfo,
    ) -> Result<Self, LineError> {
        config.validate().map_err(LineError::ConfigurationFailed)?;
        let dispatcher = EventDispatcher::new(config.listener_warn_threshold());
        Ok(Self {
            shared: Arc::new(MixerShared {
                info,
                server,
                config,
                registry: OpenLineRegistry::new(),
                dispatcher,
                transition: ReentrantMutex::new(()),
            }),
        })
    }

    pub fn info(&self) -> &MixerInfo {
        &self.shared.info
    }

    pub fn config(&self) -> &MixerConfiguration {
        &self.shared.config
    }

    /// Connect to the sound server.
    ///
    /// Fails with `IllegalState` if already open, or with the server's
    /// error (typically `LineUnavailable`) if the connection fails.
    pub fn open(&self) -> Result<(), LineError> {
        let _transition = self.shared.transition.lock();
        if self.shared.registry.is_mixer_open() {
            return Err(LineError::IllegalState("mixer is already open".into()));
        }

        let config = &self.shared.config;
        self.shared
            .server
            .connect(&config.app_name, config.server.as_deref())?;
        self.shared.registry.set_mixer_open(true);

        log::info!(
            "Mixer '{}' connected as '{}' to {}",
            self.shared.info.name,
            config.app_name,
            config.server.as_deref().unwrap_or("default server")
        );
        self.shared
            .dispatcher
            .dispatch(&LineEvent::for_mixer(LineEventKind::Open));
        Ok(())
    }

    /// Close every open line, then disconnect.
    ///
    /// Fails with `IllegalState` if the mixer is not open.
    pub fn close(&self) -> Result<(), LineError> {
        let _transition = self.shared.transition.lock();
        if !self.shared.registry.is_mixer_open() {
            return Err(LineError::IllegalState("mixer is not open".into()));
        }
        self.shared.registry.set_mixer_open(false);

        for line in self.shared.registry.snapshot() {
            log::warn!("Closing {} line {} left open at mixer close", line.direction(), line.id());
            line.close();
        }

        self.shared.server.disconnect();
        log::info!("Mixer '{}' disconnected", self.shared.info.name);
        self.shared
            .dispatcher
            .dispatch(&LineEvent::for_mixer(LineEventKind::Close));
        // Listeners do not survive a close.
        self.shared.dispatcher.clear();
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.shared.registry.is_mixer_open()
    }

    /// Create a closed playback line. `None` uses the configured default
    /// format.
    pub fn source_data_line(&self, format: Option<AudioFormat>) -> Result<SourceDataLine, LineError> {
        let format = self.checked_line_format(format)?;
        Ok(SourceDataLine::from_core(self.new_line(LineDirection::Playback, format)))
    }

    /// Create a closed capture line. `None` uses the configured default
    /// format.
    pub fn target_data_line(&self, format: Option<AudioFormat>) -> Result<TargetDataLine, LineError> {
        let format = self.checked_line_format(format)?;
        Ok(TargetDataLine::from_core(self.new_line(LineDirection::Capture, format)))
    }

    /// Create a closed line satisfying `request`.
    ///
    /// Fails with `InvalidArgument` if no line this mixer offers matches.
    pub fn get_line(&self, request: &LineInfo) -> Result<AnyLine, LineError> {
        if !self.is_line_supported(request) {
            return Err(LineError::InvalidArgument(format!(
                "no {} line matches the requested formats or buffer size",
                request.direction
            )));
        }
        let default_format = self.shared.config.default_format;
        if request.formats.is_empty() {
            return Ok(AnyLine::from_core(self.new_line(request.direction, default_format)));
        }
        // Patterns without a rate take the default rate.
        let format = request
            .formats
            .iter()
            .map(|f| AudioFormat {
                sample_rate: f.sample_rate.or(default_format.sample_rate),
                ..*f
            })
            .find(|f| f.validate_for_open().is_ok())
            .ok_or_else(|| {
                LineError::InvalidArgument(format!(
                    "none of the {} requested formats can be opened",
                    request.formats.len()
                ))
            })?;
        Ok(AnyLine::from_core(self.new_line(request.direction, format)))
    }

    /// Whether this mixer offers a line satisfying `request`. Concrete
    /// sample rates must lie in `1..=MAX_SAMPLE_RATE`.
    pub fn is_line_supported(&self, request: &LineInfo) -> bool {
        let rates_ok = request
            .formats
            .iter()
            .filter_map(|f| f.sample_rate)
            .all(|rate| (1..=format::MAX_SAMPLE_RATE).contains(&rate));
        rates_ok && request.matches(&self.line_info(request.direction))
    }

    /// Maximum number of simultaneously open lines matching `request`.
    /// `None` means unlimited.
    pub fn max_lines(&self, request: &LineInfo) -> Option<usize> {
        if self.is_line_supported(request) {
            None
        } else {
            Some(0)
        }
    }

    pub fn source_line_info(&self) -> LineInfo {
        self.line_info(LineDirection::Playback)
    }

    pub fn target_line_info(&self) -> LineInfo {
        self.line_info(LineDirection::Capture)
    }

    pub fn supported_formats(&self) -> Vec<AudioFormat> {
        format::supported_formats()
    }

    pub fn registry(&self) -> &OpenLineRegistry {
        &self.shared.registry
    }

    pub fn open_lines(&self) -> Vec<AnyLine> {
        self.shared.registry.snapshot()
    }

    pub fn source_lines(&self) -> Vec<SourceDataLine> {
        self.shared.registry.source_lines()
    }

    pub fn target_lines(&self) -> Vec<TargetDataLine> {
        self.shared.registry.target_lines()
    }

    /// Listen for the mixer's own OPEN and CLOSE events.
    pub fn add_listener(&self, listener: Arc<dyn LineListener>) -> ListenerId {
        self.shared.dispatcher.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.dispatcher.remove(id)
    }

    pub fn is_synchronization_supported(&self, _lines: &[AnyLine], _maintain: bool) -> bool {
        false
    }

    /// Always fails with `InvalidArgument`: line synchronization is not
    /// supported.
    pub fn synchronize(&self, lines: &[AnyLine], _maintain: bool) -> Result<(), LineError> {
        Err(LineError::InvalidArgument(format!(
            "cannot synchronize {} lines: synchronization is not supported",
            lines.len()
        )))
    }

    pub fn unsynchronize(&self, lines: &[AnyLine]) -> Result<(), LineError> {
        Err(LineError::InvalidArgument(format!(
            "cannot unsynchronize {} lines: synchronization is not supported",
            lines.len()
        )))
    }

    fn line_info(&self, direction: LineDirection) -> LineInfo {
        let limits = &self.shared.config.buffer;
        LineInfo {
            direction,
            formats: format::supported_formats(),
            min_buffer_size: Some(limits.min_size),
            max_buffer_size: Some(limits.max_size),
        }
    }

    fn checked_line_format(&self, format: Option<AudioFormat>) -> Result<AudioFormat, LineError> {
        let format = format.unwrap_or(self.shared.config.default_format);
        format
            .validate_for_open()
            .map_err(|e| LineError::InvalidArgument(format!("unsupported line format: {}", e)))?;
        Ok(format)
    }

    fn new_line(&self, direction: LineDirection, format: AudioFormat) -> Arc<LineCore> {
        LineCore::new(&self.shared, direction, format)
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                log::error!("Failed to close mixer on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::{Encoding, SampleFormat};
    use crate::test_support::ManualServer;
    use crate::traits::line::DataLine;
    use parking_lot::Mutex;

    fn mixer() -> (Arc<ManualServer>, Mixer) {
        let server = Arc::new(ManualServer::new());
        let mixer = Mixer::new(server.clone(), MixerConfiguration::default()).unwrap();
        (server, mixer)
    }

    fn open_mixer() -> (Arc<ManualServer>, Mixer) {
        let (server, mixer) = mixer();
        mixer.open().unwrap();
        (server, mixer)
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = MixerConfiguration {
            wait_slice_ms: 0,
            ..MixerConfiguration::default()
        };
        let err = Mixer::new(Arc::new(ManualServer::new()), config).err().unwrap();
        assert!(matches!(err, LineError::ConfigurationFailed(_)));
    }

    #[test]
    fn open_twice_is_illegal_state() {
        let (server, mixer) = open_mixer();
        assert!(server.is_connected());
        assert!(matches!(mixer.open(), Err(LineError::IllegalState(_))));
    }

    #[test]
    fn close_unopened_mixer_is_illegal_state() {
        let (_, mixer) = mixer();
        assert!(matches!(mixer.close(), Err(LineError::IllegalState(_))));
    }

    #[test]
    fn connection_failure_leaves_mixer_closed() {
        let (server, mixer) = mixer();
        server.refuse_connections(true);
        assert!(matches!(mixer.open(), Err(LineError::LineUnavailable(_))));
        assert!(!mixer.is_open());
    }

    #[test]
    fn mixer_listener_sees_open_and_close() {
        let (_, mixer) = mixer();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        mixer.add_listener(Arc::new(move |e: &LineEvent| sink.lock().push(e.kind)));

        mixer.open().unwrap();
        mixer.close().unwrap();
        assert_eq!(*events.lock(), vec![LineEventKind::Open, LineEventKind::Close]);
    }

    #[test]
    fn close_removes_mixer_listeners() {
        let (_, mixer) = open_mixer();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let id = mixer.add_listener(Arc::new(move |e: &LineEvent| sink.lock().push(e.kind)));

        mixer.close().unwrap();
        mixer.open().unwrap();
        mixer.close().unwrap();

        assert_eq!(*events.lock(), vec![LineEventKind::Close]);
        assert!(!mixer.remove_listener(id));
    }

    #[test]
    fn close_force_closes_open_lines() {
        let (server, mixer) = open_mixer();
        let playback = mixer.source_data_line(None).unwrap();
        let capture = mixer.target_data_line(None).unwrap();
        playback.open().unwrap();
        capture.open().unwrap();
        assert_eq!(mixer.open_lines().len(), 2);

        mixer.close().unwrap();
        assert!(!playback.is_open());
        assert!(!capture.is_open());
        assert!(mixer.open_lines().is_empty());
        assert!(!server.is_connected());
        assert_eq!(server.released_streams(), 2);
    }

    #[test]
    fn line_cannot_open_on_closed_mixer() {
        let (_, mixer) = mixer();
        let line = mixer.source_data_line(None).unwrap();
        assert!(matches!(line.open(), Err(LineError::LineUnavailable(_))));
        assert!(!line.is_open());
    }

    #[test]
    fn registry_tracks_open_lines_by_direction() {
        let (_, mixer) = open_mixer();
        let playback = mixer.source_data_line(None).unwrap();
        let capture = mixer.target_data_line(None).unwrap();

        playback.open().unwrap();
        assert_eq!(mixer.source_lines().len(), 1);
        assert!(mixer.target_lines().is_empty());
        assert!(mixer.registry().contains(playback.id()));

        capture.open().unwrap();
        assert_eq!(mixer.target_lines().len(), 1);

        playback.close();
        assert!(!mixer.registry().contains(playback.id()));
        assert_eq!(mixer.open_lines().len(), 1);
    }

    #[test]
    fn get_line_honours_requested_format() {
        let (_, mixer) = open_mixer();
        let format = AudioFormat::pcm_signed(48_000, 16, 2, false);
        let line = mixer
            .get_line(&LineInfo::with_format(LineDirection::Capture, format))
            .unwrap();
        assert_eq!(line.direction(), LineDirection::Capture);
        assert_eq!(line.format(), format);
    }

    #[test]
    fn get_line_without_format_uses_default() {
        let (_, mixer) = open_mixer();
        let line = mixer.get_line(&LineInfo::new(LineDirection::Playback)).unwrap();
        assert_eq!(line.format(), AudioFormat::default());
        line.open().unwrap();
        assert_eq!(line.buffer_size(), 50_000);
    }

    #[test]
    fn unsupported_request_is_invalid_argument() {
        let (_, mixer) = open_mixer();
        let weird = AudioFormat::new(Encoding::PcmUnsigned, 44_100, 13, 10, true);
        let request = LineInfo::with_format(LineDirection::Playback, weird);
        assert!(!mixer.is_line_supported(&request));
        assert_eq!(mixer.max_lines(&request), Some(0));
        assert!(matches!(mixer.get_line(&request), Err(LineError::InvalidArgument(_))));
        assert!(matches!(
            mixer.source_data_line(Some(weird)),
            Err(LineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn out_of_range_rate_is_not_replaced_by_default() {
        let (_, mixer) = open_mixer();
        for rate in [0, format::MAX_SAMPLE_RATE + 1, 500_000] {
            let wanted = AudioFormat::pcm_unsigned(rate, 8, 1);
            let request = LineInfo::with_format(LineDirection::Playback, wanted);
            assert!(!mixer.is_line_supported(&request), "rate {}", rate);
            assert_eq!(mixer.max_lines(&request), Some(0));
            assert!(matches!(mixer.get_line(&request), Err(LineError::InvalidArgument(_))));
        }

        let wanted = AudioFormat::pcm_unsigned(format::MAX_SAMPLE_RATE, 8, 1);
        let line = mixer
            .get_line(&LineInfo::with_format(LineDirection::Playback, wanted))
            .unwrap();
        assert_eq!(line.format(), wanted);
    }

    #[test]
    fn supported_request_has_unlimited_lines() {
        let (_, mixer) = open_mixer();
        let request = LineInfo::with_format(LineDirection::Playback, SampleFormat::S16Le.pattern(2));
        assert_eq!(mixer.max_lines(&request), None);
        assert_eq!(mixer.supported_formats().len(), 42);
        assert_eq!(mixer.source_line_info().direction, LineDirection::Playback);
        assert_eq!(mixer.target_line_info().direction, LineDirection::Capture);
    }

    #[test]
    fn synchronization_is_unsupported() {
        let (_, mixer) = open_mixer();
        let line = AnyLine::Source(mixer.source_data_line(None).unwrap());
        let lines = [line];
        assert!(!mixer.is_synchronization_supported(&lines, true));
        assert!(matches!(
            mixer.synchronize(&lines, true),
            Err(LineError::InvalidArgument(_))
        ));
        assert!(matches!(mixer.unsynchronize(&lines), Err(LineError::InvalidArgument(_))));
    }

    #[test]
    fn dropping_mixer_closes_lines() {
        let (_, mixer) = open_mixer();
        let line = mixer.source_data_line(None).unwrap();
        line.open().unwrap();
        drop(mixer);
        assert!(!line.is_open());
        assert!(matches!(line.open(), Err(LineError::LineUnavailable(_))));
    }
}
