use std::time::Duration;

use audio_line_core::LineError;
use serde::Deserialize;

/// Configuration for the in-process virtual sound server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VirtualServerConfig {
    /// Clock period in milliseconds (default: 5).
    pub tick_ms: u64,

    /// Playback/capture speed relative to real time (default: 1.0).
    /// Values above 1.0 make tests finish faster.
    pub time_scale: f64,

    /// Maximum number of live streams (default: 32).
    pub max_streams: usize,

    /// Refuse every connection attempt, simulating an unreachable server.
    pub refuse_connections: bool,
}

impl VirtualServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_ms == 0 {
            return Err("tick must be positive".into());
        }
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(format!("time scale {} must be positive", self.time_scale));
        }
        if self.max_streams == 0 {
            return Err("max streams must be positive".into());
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, LineError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            LineError::ConfigurationFailed(format!("invalid virtual server configuration: {}", e))
        })?;
        config.validate().map_err(LineError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for VirtualServerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 5,
            time_scale: 1.0,
            max_streams: 32,
            refuse_connections: false,
        }
    }
}
