//! Sample format description.
//!
//! A [`SampleFormat`] tells the chunk layer how to slice raw payload bytes
//! into frames. It is fixed for the lifetime of a session and shared
//! read-only between every chunk of that session.

use std::fmt;
use std::num::{NonZeroU16, NonZeroU32};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rate, bit depth and channel count of an interleaved PCM stream.
///
/// Text form is `rate:bits:channels`, e.g. `48000:16:2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SampleFormat {
    rate: NonZeroU32,
    bits: NonZeroU16,
    channels: NonZeroU16,
}

impl SampleFormat {
    /// Validate and build a format. `bits` must be a non-zero multiple of 8.
    pub fn new(rate: u32, bits: u16, channels: u16) -> Result<Self, FormatError> {
        let rate = NonZeroU32::new(rate).ok_or(FormatError::ZeroRate)?;
        let channels = NonZeroU16::new(channels).ok_or(FormatError::ZeroChannels)?;
        let bits = NonZeroU16::new(bits)
            .filter(|b| b.get() % 8 == 0)
            .ok_or(FormatError::BitDepth(bits))?;
        Ok(Self {
            rate,
            bits,
            channels,
        })
    }

    /// 48 kHz, 16 bit, stereo.
    pub fn standard() -> Self {
        Self {
            rate: NonZeroU32::new(48_000).unwrap(),
            bits: NonZeroU16::new(16).unwrap(),
            channels: NonZeroU16::new(2).unwrap(),
        }
    }

    /// Frames per second.
    pub fn rate(&self) -> u32 {
        self.rate.get()
    }

    pub fn bits(&self) -> u16 {
        self.bits.get()
    }

    pub fn channels(&self) -> u16 {
        self.channels.get()
    }

    /// Bytes per sample of a single channel.
    pub fn sample_size(&self) -> usize {
        usize::from(self.bits.get() / 8)
    }

    /// Bytes per frame: one sample per channel. Never zero.
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels.get()) * self.sample_size()
    }

    /// Number of frames covering `ms` milliseconds, rounded down.
    pub fn frames_in_ms(&self, ms: u32) -> u64 {
        u64::from(self.rate()) * u64::from(ms) / 1000
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.rate, self.bits, self.channels)
    }
}

impl FromStr for SampleFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(rate), Some(bits), Some(channels), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(FormatError::Malformed(s.to_string()));
        };
        let malformed = |_| FormatError::Malformed(s.to_string());
        Self::new(
            rate.trim().parse().map_err(malformed)?,
            bits.trim().parse().map_err(malformed)?,
            channels.trim().parse().map_err(malformed)?,
        )
    }
}

impl TryFrom<String> for SampleFormat {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SampleFormat> for String {
    fn from(f: SampleFormat) -> String {
        f.to_string()
    }
}

/// Error returned when building an invalid [`SampleFormat`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("sample rate must be non-zero")]
    ZeroRate,

    #[error("channel count must be non-zero")]
    ZeroChannels,

    #[error("bit depth {0} is not a non-zero multiple of 8")]
    BitDepth(u16),

    #[error("expected rate:bits:channels, got {0:?}")]
    Malformed(String),
}
