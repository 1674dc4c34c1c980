use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest sample rate the sound server accepts (48 kHz × 8).
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Channel counts covered by the server's default channel map.
pub const SUPPORTED_CHANNELS: std::ops::RangeInclusive<u16> = 1..=6;

/// Sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    PcmSigned,
    PcmUnsigned,
    PcmFloat,
    Alaw,
    Ulaw,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::PcmSigned => "PCM_SIGNED",
            Encoding::PcmUnsigned => "PCM_UNSIGNED",
            Encoding::PcmFloat => "PCM_FLOAT",
            Encoding::Alaw => "ALAW",
            Encoding::Ulaw => "ULAW",
        };
        f.write_str(name)
    }
}

/// Description of an audio stream's sample layout.
///
/// `sample_rate` is `None` only in format patterns (such as the supported
/// format table), where it matches any rate. Lines must be opened with a
/// concrete rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: Encoding,
    pub sample_rate: Option<u32>,
    pub sample_size_bits: u16,
    pub channels: u16,
    pub big_endian: bool,
}

impl AudioFormat {
    pub fn new(
        encoding: Encoding,
        sample_rate: u32,
        sample_size_bits: u16,
        channels: u16,
        big_endian: bool,
    ) -> Self {
        Self {
            encoding,
            sample_rate: Some(sample_rate),
            sample_size_bits,
            channels,
            big_endian,
        }
    }

    pub fn pcm_signed(sample_rate: u32, sample_size_bits: u16, channels: u16, big_endian: bool) -> Self {
        Self::new(Encoding::PcmSigned, sample_rate, sample_size_bits, channels, big_endian)
    }

    pub fn pcm_unsigned(sample_rate: u32, sample_size_bits: u16, channels: u16) -> Self {
        Self::new(Encoding::PcmUnsigned, sample_rate, sample_size_bits, channels, false)
    }

    /// Bytes per frame: one sample (rounded up to whole bytes) per channel.
    pub fn frame_size(&self) -> usize {
        let sample_bytes = (self.sample_size_bits as usize).div_ceil(8);
        sample_bytes * self.channels as usize
    }

    /// Frames per second. Equal to the sample rate for every supported encoding.
    pub fn frame_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Bytes per second, if the sample rate is known.
    pub fn byte_rate(&self) -> Option<f64> {
        self.sample_rate
            .map(|rate| rate as f64 * self.frame_size() as f64)
    }

    /// Whether this format satisfies `pattern`.
    ///
    /// An unspecified pattern sample rate matches any rate. Byte order is
    /// ignored for samples of one byte or less.
    pub fn matches(&self, pattern: &AudioFormat) -> bool {
        if self.encoding != pattern.encoding
            || self.sample_size_bits != pattern.sample_size_bits
            || self.channels != pattern.channels
        {
            return false;
        }
        if let (Some(rate), Some(wanted)) = (self.sample_rate, pattern.sample_rate) {
            if rate != wanted {
                return false;
            }
        }
        self.sample_size_bits <= 8 || self.big_endian == pattern.big_endian
    }

    /// Check that a line can be opened with this format.
    pub fn validate_for_open(&self) -> Result<SampleFormat, String> {
        let rate = self
            .sample_rate
            .ok_or_else(|| "sample rate must be specified".to_string())?;
        if rate == 0 || rate > MAX_SAMPLE_RATE {
            return Err(format!("unsupported sample rate: {}", rate));
        }
        if !SUPPORTED_CHANNELS.contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        SampleFormat::for_format(self).ok_or_else(|| format!("unsupported format: {}", self))
    }
}

impl Default for AudioFormat {
    /// Unsigned 8-bit stereo at 44.1 kHz.
    fn default() -> Self {
        Self::pcm_unsigned(44_100, 8, 2)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.encoding)?;
        match self.sample_rate {
            Some(rate) => write!(f, "{} Hz", rate)?,
            None => write!(f, "unknown sample rate")?,
        }
        let channels = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{} channels", n),
        };
        write!(
            f,
            ", {} bit, {}, {} bytes/frame",
            self.sample_size_bits,
            channels,
            self.frame_size()
        )?;
        if self.sample_size_bits > 8 {
            f.write_str(if self.big_endian { ", big-endian" } else { ", little-endian" })?;
        }
        Ok(())
    }
}

/// Native sample formats understood by the sound server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    U8,
    Alaw,
    Ulaw,
    S16Le,
    S16Be,
    S32Le,
    S32Be,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 7] = [
        SampleFormat::Alaw,
        SampleFormat::Ulaw,
        SampleFormat::S16Be,
        SampleFormat::S16Le,
        SampleFormat::S32Be,
        SampleFormat::S32Le,
        SampleFormat::U8,
    ];

    /// Map an audio format onto the server's sample format, ignoring rate and channels.
    pub fn for_format(format: &AudioFormat) -> Option<Self> {
        match (format.encoding, format.sample_size_bits, format.big_endian) {
            (Encoding::PcmUnsigned, 8, _) => Some(Self::U8),
            (Encoding::Alaw, 8, _) => Some(Self::Alaw),
            (Encoding::Ulaw, 8, _) => Some(Self::Ulaw),
            (Encoding::PcmSigned, 16, false) => Some(Self::S16Le),
            (Encoding::PcmSigned, 16, true) => Some(Self::S16Be),
            (Encoding::PcmSigned, 32, false) => Some(Self::S32Le),
            (Encoding::PcmSigned, 32, true) => Some(Self::S32Be),
            _ => None,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Self::U8 => Encoding::PcmUnsigned,
            Self::Alaw => Encoding::Alaw,
            Self::Ulaw => Encoding::Ulaw,
            Self::S16Le | Self::S16Be | Self::S32Le | Self::S32Be => Encoding::PcmSigned,
        }
    }

    pub fn sample_size_bits(&self) -> u16 {
        match self {
            Self::U8 | Self::Alaw | Self::Ulaw => 8,
            Self::S16Le | Self::S16Be => 16,
            Self::S32Le | Self::S32Be => 32,
        }
    }

    pub fn is_big_endian(&self) -> bool {
        matches!(self, Self::S16Be | Self::S32Be)
    }

    /// Byte value that encodes silence in this format.
    pub fn silence(&self) -> u8 {
        match self {
            Self::U8 => 0x80,
            Self::Alaw => 0xd5,
            Self::Ulaw => 0xff,
            _ => 0x00,
        }
    }

    /// Format pattern (unspecified rate) with the given channel count.
    pub fn pattern(&self, channels: u16) -> AudioFormat {
        AudioFormat {
            encoding: self.encoding(),
            sample_rate: None,
            sample_size_bits: self.sample_size_bits(),
            channels,
            big_endian: self.is_big_endian(),
        }
    }
}

/// Every format pattern the server accepts, grouped by sample format.
pub fn supported_formats() -> Vec<AudioFormat> {
    SampleFormat::ALL
        .iter()
        .flat_map(|sample| SUPPORTED_CHANNELS.map(move |channels| sample.pattern(channels)))
        .collect()
}
