//! pcmwire wire format — fixed-width layouts shared by every message.
//!
//! These types ARE the protocol. Every field and every size is part of the
//! wire format; peers built against a different layout cannot talk to each
//! other.
//!
//! All integers are written in the host's native byte order and fields are
//! concatenated with no padding. The types are #[repr(C, packed)] and use
//! zerocopy derives, so encoding a prefix is a plain byte copy. There is no
//! unsafe code in this module.

use std::io::{self, Read};

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Envelope ─────────────────────────────────────────────────────────────────

/// The (type, size) prefix that precedes every message body.
///
/// `size` is the exact byte length of the body that follows. Encoders always
/// recompute it from the body; decoders only use it to bound the body read.
///
/// Wire size: 6 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Envelope {
    /// Raw message type tag. See [`MessageType`].
    pub type_tag: u16,

    /// Length of the body in bytes, not including this prefix.
    pub size: u32,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(Envelope, [u8; ENVELOPE_LEN]);

impl Envelope {
    pub fn new(message_type: MessageType, size: u32) -> Self {
        Self {
            type_tag: message_type.into(),
            size,
        }
    }

    /// Body length declared by the sender.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Resolve the type tag.
    ///
    /// An unknown tag is reported together with the declared size so the
    /// caller can skip the body and stay in sync with the stream.
    pub fn message_type(&self) -> Result<MessageType, WireError> {
        let type_tag = self.type_tag;
        MessageType::from_u16(type_tag).ok_or(WireError::UnrecognizedType {
            type_tag,
            size: self.size,
        })
    }

    /// Read exactly [`ENVELOPE_LEN`] bytes. The body is left in the reader.
    pub fn read_from_stream(reader: &mut impl Read) -> Result<Self, WireError> {
        let mut raw = [0u8; ENVELOPE_LEN];
        read_exact(reader, &mut raw)?;
        // Length matches exactly, read_from cannot fail here.
        Self::read_from(&raw[..]).ok_or(WireError::TruncatedMessage {
            needed: ENVELOPE_LEN,
        })
    }

    /// Discard the body announced by this envelope.
    ///
    /// Used to resynchronise after an [`WireError::UnrecognizedType`].
    pub fn skip_body(&self, reader: &mut impl Read) -> Result<(), WireError> {
        let size = self.size;
        let skipped = io::copy(&mut reader.by_ref().take(u64::from(size)), &mut io::sink())?;
        if skipped < u64::from(size) {
            return Err(WireError::TruncatedMessage {
                needed: (u64::from(size) - skipped) as usize,
            });
        }
        Ok(())
    }
}

// ── Message types ────────────────────────────────────────────────────────────

/// Message type discriminator carried in [`Envelope::type_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    /// Opaque codec configuration, sent once per session.
    Header = 0,
    /// Timestamped audio payload, sent repeatedly.
    Payload = 1,
}

impl MessageType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Header),
            1 => Some(Self::Payload),
            _ => None,
        }
    }
}

impl From<MessageType> for u16 {
    fn from(t: MessageType) -> u16 {
        t as u16
    }
}

// ── Body prefixes ────────────────────────────────────────────────────────────

/// Fixed-width part of a timestamped chunk body. The payload follows it.
///
/// `tv_sec`/`tv_usec` describe the capture instant of payload byte 0.
/// `tv_usec` is expected in `0..1_000_000` but is never checked.
///
/// Wire size: 12 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ChunkPrefix {
    pub tv_sec: i32,
    pub tv_usec: i32,
    pub payload_size: u32,
}

assert_eq_size!(ChunkPrefix, [u8; CHUNK_PREFIX_LEN]);

/// Fixed-width part of a header message body.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct HeaderPrefix {
    pub payload_size: u32,
}

assert_eq_size!(HeaderPrefix, [u8; HEADER_PREFIX_LEN]);

// ── Constants ────────────────────────────────────────────────────────────────

/// Envelope length: u16 type + u32 size.
pub const ENVELOPE_LEN: usize = 6;

/// Timestamped chunk prefix length: i32 + i32 + u32.
pub const CHUNK_PREFIX_LEN: usize = 12;

/// Header message prefix length: u32.
pub const HEADER_PREFIX_LEN: usize = 4;

/// Default upper bound for an envelope's declared body size.
/// Larger envelopes are rejected before any body allocation.
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 4 * 1024 * 1024;

// ── Buffers ──────────────────────────────────────────────────────────────────

/// Allocate a zeroed buffer of `len` bytes, reporting allocator failure
/// instead of aborting.
pub fn zeroed_buffer(len: usize) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| WireError::AllocationFailure(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// `read_exact` with end-of-stream reported as a truncated message.
pub fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), WireError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => WireError::TruncatedMessage { needed: buf.len() },
        kind => WireError::Io(kind),
    })
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when encoding or interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The stream ended before the declared length was satisfied.
    /// The session should be dropped.
    #[error("truncated message: {needed} more bytes expected")]
    TruncatedMessage { needed: usize },

    /// A payload buffer of the requested size could not be allocated.
    #[error("failed to allocate {0} byte payload buffer")]
    AllocationFailure(usize),

    /// The envelope's type tag is not known to this build.
    /// `size` body bytes follow and may be skipped.
    #[error("unrecognized message type {type_tag} ({size} byte body)")]
    UnrecognizedType { type_tag: u16, size: u32 },

    #[error("message size {size} exceeds maximum {max}")]
    MessageTooLarge { size: u32, max: u32 },

    #[error("payload length {0} does not fit the wire format")]
    PayloadTooLarge(usize),

    #[error("timestamp {0}s does not fit a 32-bit seconds field")]
    TimestampOutOfRange(i64),

    #[error("i/o error: {0}")]
    Io(io::ErrorKind),
}

impl From<io::Error> for WireError {
    fn from(e: io::Error) -> Self {
        WireError::Io(e.kind())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
