//! # audio-line-virtual
//!
//! In-process virtual sound server for audio-line-core.
//!
//! Provides:
//! - `VirtualSoundServer`: `SoundServer` with a real-time clock thread
//! - `VirtualStream`: playback streams that drain at the format's byte
//!   rate and capture streams that fill with a non-silent test signal
//! - `VirtualServerConfig`: clock period, time scale, stream limit
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_line_core::{DataLine, Line, Mixer, MixerConfiguration};
//! use audio_line_virtual::VirtualSoundServer;
//!
//! let server = Arc::new(VirtualSoundServer::with_defaults());
//! let mixer = Mixer::new(server, MixerConfiguration::default())?;
//! mixer.open()?;
//! let line = mixer.source_data_line(None)?;
//! line.open()?;
//! line.start()?;
//! line.write(&[0x80; 4096])?;
//! line.drain()?;
//! ```

mod clock;
pub mod config;
pub mod server;
pub mod stream;

pub use config::VirtualServerConfig;
pub use server::VirtualSoundServer;
pub use stream::{VirtualStream, VirtualStreamStats};
