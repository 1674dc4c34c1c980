use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use audio_line_core::{LineError, NativeStream, SoundServer, StreamNotifier, StreamRequest};
use parking_lot::Mutex;

use crate::clock::{self, StreamTable};
use crate::config::VirtualServerConfig;
use crate::stream::{VirtualStream, VirtualStreamStats};

/// In-process sound server driven by a real-time clock thread.
///
/// `connect` starts the clock; `disconnect` stops it and releases every
/// stream still bound to the connection.
pub struct VirtualSoundServer {
    config: VirtualServerConfig,
    connected: AtomicBool,
    app_name: Mutex<Option<String>>,
    streams: StreamTable,
    running: Arc<AtomicBool>,
    clock_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl VirtualSoundServer {
    /// Fails with `ConfigurationFailed` if `config` is invalid.
    pub fn new(config: VirtualServerConfig) -> Result<Self, LineError> {
        config.validate().map_err(LineError::ConfigurationFailed)?;
        Ok(Self::unchecked(config))
    }

    pub fn with_defaults() -> Self {
        Self::unchecked(VirtualServerConfig::default())
    }

    fn unchecked(config: VirtualServerConfig) -> Self {
        Self {
            config,
            connected: AtomicBool::new(false),
            app_name: Mutex::new(None),
            streams: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            clock_handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &VirtualServerConfig {
        &self.config
    }

    /// Name the current client connected with.
    pub fn app_name(&self) -> Option<String> {
        self.app_name.lock().clone()
    }

    /// Number of live (unreleased) streams.
    pub fn stream_count(&self) -> usize {
        self.streams.lock().iter().filter(|s| !s.is_released()).count()
    }

    pub fn stream_stats(&self) -> Vec<VirtualStreamStats> {
        self.streams.lock().iter().map(|s| s.stats()).collect()
    }

    /// Advance every stream by `elapsed`, as one clock tick would.
    pub fn advance(&self, elapsed: Duration) {
        clock::advance_all(&self.streams, elapsed, self.config.time_scale);
    }

    fn stop_clock(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.clock_handle.lock().take() {
            handle.thread().unpark();
            clock::join(handle);
        }
    }
}

impl SoundServer for VirtualSoundServer {
    fn connect(&self, app_name: &str, server: Option<&str>) -> Result<(), LineError> {
        let target = server.unwrap_or("default");
        if self.config.refuse_connections {
            return Err(LineError::LineUnavailable(format!(
                "virtual server '{}' refused the connection",
                target
            )));
        }
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(LineError::IllegalState("already connected".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        let handle = match clock::spawn(
            Arc::clone(&self.running),
            Arc::clone(&self.streams),
            self.config.tick(),
            self.config.time_scale,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.connected.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        *self.clock_handle.lock() = Some(handle);
        *self.app_name.lock() = Some(app_name.to_string());

        log::info!("Virtual server '{}' accepted client '{}'", target, app_name);
        Ok(())
    }

    fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop_clock();

        let streams: Vec<Arc<VirtualStream>> = self.streams.lock().drain(..).collect();
        for stream in &streams {
            stream.release();
        }
        *self.app_name.lock() = None;
        log::info!("Virtual server disconnected ({} streams released)", streams.len());
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
            return Err(LineError::LineUnavailable("not connected to a sound server".into()));
        }
        request
            .format
            .validate_for_open()
            .map_err(LineError::LineUnavailable)?;

        let mut table = self.streams.lock();
        table.retain(|s| !s.is_released());
        if table.len() >= self.config.max_streams {
            return Err(LineError::LineUnavailable(format!(
                "no free streams ({} in use)",
                table.len()
            )));
        }

        log::debug!(
            "Creating {} stream '{}' ({}, {} bytes)",
            request.direction,
            request.name,
            request.format,
            request.buffer_size
        );
        let stream = Arc::new(VirtualStream::new(request, notifier));
        table.push(Arc::clone(&stream));
        Ok(stream)
    }
}

impl Drop for VirtualSoundServer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use audio_line_core::{AudioFormat, LineDirection, LineId};

    fn request(direction: LineDirection) -> StreamRequest {
        StreamRequest {
            line: LineId::new(),
            name: "test".into(),
            direction,
            format: AudioFormat::pcm_unsigned(8_000, 8, 1),
            buffer_size: 1_000,
        }
    }

    fn noop() -> StreamNotifier {
        Arc::new(|| {})
    }

    #[test]
    fn refused_connection_is_line_unavailable() {
        let server = VirtualSoundServer::new(VirtualServerConfig {
            refuse_connections: true,
            ..VirtualServerConfig::default()
        })
        .unwrap();
        assert!(matches!(
            server.connect("app", None),
            Err(LineError::LineUnavailable(_))
        ));
        assert!(!server.is_connected());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = VirtualServerConfig {
            tick_ms: 0,
            ..VirtualServerConfig::default()
        };
        assert!(matches!(
            VirtualSoundServer::new(config),
            Err(LineError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn streams_require_a_connection() {
        let server = VirtualSoundServer::with_defaults();
        assert!(matches!(
            server.create_stream(request(LineDirection::Playback), noop()),
            Err(LineError::LineUnavailable(_))
        ));
    }

    #[test]
    fn stream_limit_is_enforced_and_released_streams_free_slots() {
        let server = VirtualSoundServer::new(VirtualServerConfig {
            max_streams: 1,
            ..VirtualServerConfig::default()
        })
        .unwrap();
        server.connect("app", None).unwrap();

        let first = server
            .create_stream(request(LineDirection::Playback), noop())
            .unwrap();
        assert!(matches!(
            server.create_stream(request(LineDirection::Capture), noop()),
            Err(LineError::LineUnavailable(_))
        ));

        first.release();
        assert_eq!(server.stream_count(), 0);
        assert!(server
            .create_stream(request(LineDirection::Capture), noop())
            .is_ok());
    }

    #[test]
    fn disconnect_releases_streams() {
        let server = VirtualSoundServer::with_defaults();
        server.connect("app", Some("studio")).unwrap();
        assert_eq!(server.app_name().as_deref(), Some("app"));
        assert!(matches!(
            server.connect("app", None),
            Err(LineError::IllegalState(_))
        ));

        let stream = server
            .create_stream(request(LineDirection::Playback), noop())
            .unwrap();
        server.disconnect();
        assert!(!server.is_connected());
        assert!(matches!(stream.write(&[1]), Err(LineError::IllegalState(_))));
        assert_eq!(server.stream_count(), 0);
        assert!(server.app_name().is_none());
    }

    #[test]
    fn manual_advance_moves_uncorked_streams() {
        let server = VirtualSoundServer::new(VirtualServerConfig {
            tick_ms: 10_000,
            ..VirtualServerConfig::default()
        })
        .unwrap();
        server.connect("app", None).unwrap();
        let stream = server
            .create_stream(request(LineDirection::Playback), noop())
            .unwrap();
        stream.write(&[1; 100]).unwrap();
        stream.cork(false).unwrap();

        server.advance(Duration::from_millis(5));
        assert_eq!(stream.device_position(), 40);
        let stats = server.stream_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].queued_bytes, 60);
        assert!(!stats[0].corked);
        assert_relative_eq!(stats[0].volume, 1.0);
    }

    #[test]
    fn clock_drains_playback_in_real_time() {
        let server = VirtualSoundServer::new(VirtualServerConfig {
            time_scale: 10.0,
            ..VirtualServerConfig::default()
        })
        .unwrap();
        server.connect("app", None).unwrap();
        let stream = server
            .create_stream(request(LineDirection::Playback), noop())
            .unwrap();
        stream.write(&[1; 800]).unwrap();
        stream.cork(false).unwrap();

        // 800 bytes at 80 kB/s of scaled time is 10 ms.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while stream.queued_bytes() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(stream.queued_bytes(), 0);
        assert_eq!(stream.device_position(), 800);
        server.disconnect();
    }
}
