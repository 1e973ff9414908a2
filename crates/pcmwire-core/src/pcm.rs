//! Frame-addressed view of a timestamped chunk.
//!
//! A [`PcmChunk`] binds a received [`WireChunk`] to the session's
//! [`SampleFormat`] and keeps a read cursor measured in frames. Playback
//! pacing reads frames sequentially, seeks to correct drift, and asks how
//! old the next frame is relative to a reference clock.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::StreamConfig;
use crate::format::SampleFormat;
use crate::message::WireChunk;
use crate::wire::WireError;

/// A timestamped chunk with a frame cursor.
///
/// Invariant: `cursor() <= frame_count()`. Trailing bytes that do not form
/// a whole frame are never addressed.
#[derive(Debug, Clone)]
pub struct PcmChunk {
    chunk: WireChunk,
    format: Arc<SampleFormat>,
    idx: u32,
}

impl PcmChunk {
    pub fn new(chunk: WireChunk, format: Arc<SampleFormat>) -> Self {
        Self {
            chunk,
            format,
            idx: 0,
        }
    }

    /// A silent chunk long enough to hold `ms` milliseconds of audio.
    pub fn with_duration(format: Arc<SampleFormat>, ms: u32) -> Result<Self, WireError> {
        let frames = format.frames_in_ms(ms);
        let len = frames
            .checked_mul(format.frame_size() as u64)
            .and_then(|len| usize::try_from(len).ok())
            .ok_or(WireError::AllocationFailure(usize::MAX))?;
        Ok(Self::new(WireChunk::zeroed(len)?, format))
    }

    /// A silent producer chunk of `chunk_ms` in the configured format.
    pub fn for_stream(config: &StreamConfig) -> Result<Self, WireError> {
        Self::with_duration(config.shared_format(), config.chunk_ms)
    }

    pub fn format(&self) -> &SampleFormat {
        &self.format
    }

    /// Current read position, in frames.
    pub fn cursor(&self) -> u32 {
        self.idx
    }

    /// Whole frames in the payload.
    pub fn frame_count(&self) -> u32 {
        let frames = self.chunk.payload().len() / self.format.frame_size();
        u32::try_from(frames).unwrap_or(u32::MAX)
    }

    pub fn is_end_of_chunk(&self) -> bool {
        self.idx >= self.frame_count()
    }

    /// Copy up to `frame_count` frames from the cursor into `dest` and advance.
    ///
    /// Never copies more than requested, more than remain, or more whole
    /// frames than `dest` can hold. Returns the number of frames copied; 0 at
    /// the end of the chunk.
    pub fn read_frames(&mut self, dest: &mut [u8], frame_count: u32) -> u32 {
        let frame_size = self.format.frame_size();
        let remaining = self.frame_count() - self.idx;
        let fits = u32::try_from(dest.len() / frame_size).unwrap_or(u32::MAX);
        let n = frame_count.min(remaining).min(fits);

        let start = self.idx as usize * frame_size;
        let len = n as usize * frame_size;
        dest[..len].copy_from_slice(&self.chunk.payload()[start..start + len]);
        self.idx += n;
        n
    }

    /// Move the cursor by `frames`, clamped to `[0, frame_count]`.
    /// Returns the new cursor.
    pub fn seek(&mut self, frames: i64) -> u32 {
        let target = i64::from(self.idx)
            .saturating_add(frames)
            .clamp(0, i64::from(self.frame_count()));
        self.idx = target as u32;
        self.idx
    }

    /// Capture instant of the frame under the cursor.
    pub fn time_point(&self) -> DateTime<Utc> {
        self.chunk.timestamp() + TimeDelta::microseconds(self.frames_to_us(self.idx) as i64)
    }

    /// How long ago, relative to `now`, the frame under the cursor was
    /// captured. Negative when that frame lies in the future.
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.time_point()
    }

    /// [`age_at`](Self::age_at) against the system clock.
    pub fn age(&self) -> TimeDelta {
        self.age_at(Utc::now())
    }

    /// Playing time of the whole chunk, independent of the cursor.
    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_us())
    }

    pub fn duration_us(&self) -> u64 {
        self.frames_to_us(self.frame_count())
    }

    /// Playing time left from the cursor to the end of the chunk.
    pub fn time_left(&self) -> Duration {
        Duration::from_micros(self.frames_to_us(self.frame_count() - self.idx))
    }

    /// Release the frame view and return the underlying chunk.
    pub fn into_wire(self) -> WireChunk {
        self.chunk
    }

    /// Writable payload bytes, for producers filling a fresh chunk.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        self.chunk.payload_mut()
    }

    pub fn set_timestamp(&mut self, at: DateTime<Utc>) -> Result<(), WireError> {
        self.chunk.set_timestamp(at)
    }

    fn frames_to_us(&self, frames: u32) -> u64 {
        u64::from(frames) * 1_000_000 / u64::from(self.format.rate())
    }
}

impl Deref for PcmChunk {
    type Target = WireChunk;

    fn deref(&self) -> &WireChunk {
        &self.chunk
    }
}
