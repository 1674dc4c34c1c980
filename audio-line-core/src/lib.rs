//! # audio-line-core
//!
//! Platform-agnostic audio line core.
//!
//! Provides the playback/capture line lifecycle (open, start, stop, drain,
//! flush, close), synchronous event dispatch, and the mixer's registry of
//! open lines. Sound-server backends implement the `SoundServer` and
//! `NativeStream` traits and plug into the generic `Mixer`.
//!
//! ## Architecture
//!
//! ```text
//! audio-line-core (this crate)
//! ├── traits/       ← SoundServer, NativeStream, LineListener, Line, DataLine
//! ├── models/       ← LineError, LineState, AudioFormat, LineEvent, MixerConfiguration, etc.
//! ├── processing/   ← ByteRingBuffer, transfer validation, frame arithmetic
//! ├── line/         ← LineCore state machine, EventDispatcher, Source/TargetDataLine
//! └── mixer/        ← Mixer (line factory), OpenLineRegistry
//! ```

pub mod line;
pub mod mixer;
pub mod models;
pub mod processing;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use line::dispatcher::{EventDispatcher, ListenerId};
pub use line::{AnyLine, SourceDataLine, TargetDataLine};
pub use mixer::registry::OpenLineRegistry;
pub use mixer::{Mixer, MixerInfo};
pub use models::config::{BufferLimits, MixerConfiguration};
pub use models::error::LineError;
pub use models::event::{EventSource, LineEvent, LineEventKind};
pub use models::format::{AudioFormat, Encoding, SampleFormat};
pub use models::line_info::{LineDirection, LineId, LineInfo, LineStatus};
pub use models::state::LineState;
pub use processing::ring_buffer::ByteRingBuffer;
pub use traits::line::{DataLine, Line};
pub use traits::listener::LineListener;
pub use traits::stream::{NativeStream, SoundServer, StreamNotifier, StreamRequest};
