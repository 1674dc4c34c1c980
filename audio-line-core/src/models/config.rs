use std::time::Duration;

use serde::Deserialize;

use super::error::LineError;
use super::format::AudioFormat;

/// Buffer size used when a line is opened without an explicit size.
pub const DEFAULT_BUFFER_SIZE: usize = 50_000;

/// Limits applied to requested line buffer sizes, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BufferLimits {
    pub default_size: usize,
    pub min_size: usize,
    pub max_size: usize,
}

impl BufferLimits {
    /// Resolve a requested buffer size for a line with the given frame size.
    ///
    /// `None` selects the default. The result is clamped to the limits and
    /// rounded down to whole frames, never below one frame.
    pub fn resolve(&self, requested: Option<usize>, frame_size: usize) -> Result<usize, LineError> {
        let size = match requested {
            Some(0) => {
                return Err(LineError::InvalidArgument(
                    "buffer size must be positive".into(),
                ))
            }
            Some(size) => size,
            None => self.default_size,
        };
        let clamped = size.clamp(self.min_size, self.max_size);
        let frame_size = frame_size.max(1);
        Ok((clamped / frame_size).max(1) * frame_size)
    }
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_BUFFER_SIZE,
            min_size: 64,
            max_size: 1_000_000,
        }
    }
}

/// Configuration for a mixer and the lines it creates.
///
/// Passed to `Mixer::new` and shared with every line; there is no global
/// instance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MixerConfiguration {
    /// Application name announced to the sound server.
    pub app_name: String,

    /// Server address, or None for the local default server.
    pub server: Option<String>,

    /// Format used by lines created without an explicit format.
    pub default_format: AudioFormat,

    pub buffer: BufferLimits,

    /// Upper bound on a single wait inside write/read/drain before the
    /// waiter re-checks line state (default: 50).
    pub wait_slice_ms: u64,

    /// Listeners running longer than this are reported at warn level
    /// (default: 100).
    pub listener_warn_ms: u64,
}

impl MixerConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.app_name.trim().is_empty() {
            return Err("app name must not be empty".into());
        }
        if self.buffer.min_size == 0 {
            return Err("minimum buffer size must be positive".into());
        }
        if self.buffer.min_size > self.buffer.max_size {
            return Err(format!(
                "minimum buffer size {} exceeds maximum {}",
                self.buffer.min_size, self.buffer.max_size
            ));
        }
        if !(self.buffer.min_size..=self.buffer.max_size).contains(&self.buffer.default_size) {
            return Err(format!(
                "default buffer size {} outside {}..={}",
                self.buffer.default_size, self.buffer.min_size, self.buffer.max_size
            ));
        }
        if self.wait_slice_ms == 0 {
            return Err("wait slice must be positive".into());
        }
        self.default_format
            .validate_for_open()
            .map_err(|e| format!("default format: {}", e))?;
        Ok(())
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, LineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LineError::ConfigurationFailed(format!("invalid mixer configuration: {}", e)))?;
        config.validate().map_err(LineError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn wait_slice(&self) -> Duration {
        Duration::from_millis(self.wait_slice_ms)
    }

    pub fn listener_warn_threshold(&self) -> Duration {
        Duration::from_millis(self.listener_warn_ms)
    }
}

impl Default for MixerConfiguration {
    fn default() -> Self {
        Self {
            app_name: "audio-line".into(),
            server: None,
            default_format: AudioFormat::default(),
            buffer: BufferLimits::default(),
            wait_slice_ms: 50,
            listener_warn_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MixerConfiguration::default().validate().is_ok());
    }

    #[test]
    fn resolve_clamps_and_aligns_to_frames() {
        let limits = BufferLimits::default();
        assert_eq!(limits.resolve(None, 4).unwrap(), DEFAULT_BUFFER_SIZE);
        assert_eq!(limits.resolve(Some(10_000), 1).unwrap(), 10_000);
        assert_eq!(limits.resolve(Some(10_001), 4).unwrap(), 10_000);
        assert_eq!(limits.resolve(Some(1), 4).unwrap(), 64);
        assert_eq!(limits.resolve(Some(usize::MAX), 6).unwrap(), 999_996);
    }

    #[test]
    fn resolve_never_goes_below_one_frame() {
        let limits = BufferLimits {
            default_size: 8,
            min_size: 8,
            max_size: 8,
        };
        assert_eq!(limits.resolve(None, 24).unwrap(), 24);
    }

    #[test]
    fn zero_buffer_size_is_rejected() {
        let err = BufferLimits::default().resolve(Some(0), 2).unwrap_err();
        assert!(matches!(err, LineError::InvalidArgument(_)));
    }

    #[test]
    fn json_overrides_only_given_fields() {
        let config = MixerConfiguration::from_json_str(
            r#"{ "app_name": "player", "buffer": { "default_size": 4096 } }"#,
        )
        .unwrap();
        assert_eq!(config.app_name, "player");
        assert_eq!(config.buffer.default_size, 4096);
        assert_eq!(config.buffer.max_size, 1_000_000);
        assert_eq!(config.wait_slice_ms, 50);
    }

    #[test]
    fn invalid_json_config_is_a_configuration_error() {
        let err = MixerConfiguration::from_json_str(r#"{ "wait_slice_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, LineError::ConfigurationFailed(_)));

        let err = MixerConfiguration::from_json_str("not json").unwrap_err();
        assert!(matches!(err, LineError::ConfigurationFailed(_)));
    }
}
