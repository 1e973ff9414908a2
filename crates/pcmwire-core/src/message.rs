//! Message bodies and the envelope codec.
//!
//! Every message travels as an [`Envelope`] followed by its body. The set of
//! bodies is closed: [`Message`] has one variant per [`MessageType`], and
//! encoding/decoding is a match over those variants.

use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, TimeDelta, Utc};
use zerocopy::{AsBytes, FromBytes};

use crate::wire::{
    self, ChunkPrefix, Envelope, HeaderPrefix, MessageType, WireError, CHUNK_PREFIX_LEN,
    ENVELOPE_LEN, HEADER_PREFIX_LEN,
};

// ── Header message ───────────────────────────────────────────────────────────

/// Opaque codec configuration blob, exchanged once at the start of a session.
///
/// Carries no timestamp: it describes the stream, it is not part of the
/// playback timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMessage {
    payload: Vec<u8>,
}

impl HeaderMessage {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Serialized body length: u32 length prefix + payload.
    pub fn body_len(&self) -> Result<u32, WireError> {
        payload_len(&self.payload)?
            .checked_add(HEADER_PREFIX_LEN as u32)
            .ok_or(WireError::PayloadTooLarge(self.payload.len()))
    }

    pub fn encode_body(&self, out: &mut BytesMut) -> Result<(), WireError> {
        let prefix = HeaderPrefix {
            payload_size: payload_len(&self.payload)?,
        };
        out.put_slice(prefix.as_bytes());
        out.put_slice(&self.payload);
        Ok(())
    }

    /// Decode a body, replacing the current payload.
    pub fn read_body(&mut self, body: &[u8]) -> Result<(), WireError> {
        let prefix = HeaderPrefix::read_from_prefix(body).ok_or_else(|| {
            WireError::TruncatedMessage {
                needed: HEADER_PREFIX_LEN - body.len(),
            }
        })?;
        self.payload = read_payload(&body[HEADER_PREFIX_LEN..], prefix.payload_size)?;
        Ok(())
    }

    pub fn decode_body(body: &[u8]) -> Result<Self, WireError> {
        let mut header = Self::default();
        header.read_body(body)?;
        Ok(header)
    }
}

// ── Timestamped chunk ────────────────────────────────────────────────────────

/// A timestamped run of raw audio bytes, the unit transported repeatedly.
///
/// The timestamp is the absolute capture instant of payload byte 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireChunk {
    pub tv_sec: i32,
    pub tv_usec: i32,
    payload: Vec<u8>,
}

impl WireChunk {
    pub fn new(tv_sec: i32, tv_usec: i32, payload: Vec<u8>) -> Self {
        Self {
            tv_sec,
            tv_usec,
            payload,
        }
    }

    /// A zero-filled chunk of `len` payload bytes, timestamped at the epoch.
    pub fn zeroed(len: usize) -> Result<Self, WireError> {
        Ok(Self::new(0, 0, wire::zeroed_buffer(len)?))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable view of the payload bytes. The length cannot change.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Capture instant of payload byte 0.
    ///
    /// `tv_usec` is applied as-is: values outside `0..1_000_000` shift the
    /// instant by whole seconds rather than being rejected.
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
            + TimeDelta::seconds(i64::from(self.tv_sec))
            + TimeDelta::microseconds(i64::from(self.tv_usec))
    }

    /// Stamp the chunk with a capture instant, truncated to microseconds.
    pub fn set_timestamp(&mut self, at: DateTime<Utc>) -> Result<(), WireError> {
        let secs = at.timestamp();
        self.tv_sec = i32::try_from(secs).map_err(|_| WireError::TimestampOutOfRange(secs))?;
        // < 2_000_000 even inside a leap second.
        self.tv_usec = at.timestamp_subsec_micros() as i32;
        Ok(())
    }

    /// Serialized body length: 4 + 4 + 4 + payload.
    pub fn body_len(&self) -> Result<u32, WireError> {
        payload_len(&self.payload)?
            .checked_add(CHUNK_PREFIX_LEN as u32)
            .ok_or(WireError::PayloadTooLarge(self.payload.len()))
    }

    pub fn encode_body(&self, out: &mut BytesMut) -> Result<(), WireError> {
        let prefix = ChunkPrefix {
            tv_sec: self.tv_sec,
            tv_usec: self.tv_usec,
            payload_size: payload_len(&self.payload)?,
        };
        out.put_slice(prefix.as_bytes());
        out.put_slice(&self.payload);
        Ok(())
    }

    /// Decode a body, replacing timestamp and payload.
    pub fn read_body(&mut self, body: &[u8]) -> Result<(), WireError> {
        let prefix = ChunkPrefix::read_from_prefix(body).ok_or_else(|| {
            WireError::TruncatedMessage {
                needed: CHUNK_PREFIX_LEN - body.len(),
            }
        })?;
        self.payload = read_payload(&body[CHUNK_PREFIX_LEN..], prefix.payload_size)?;
        self.tv_sec = prefix.tv_sec;
        self.tv_usec = prefix.tv_usec;
        Ok(())
    }

    pub fn decode_body(body: &[u8]) -> Result<Self, WireError> {
        let mut chunk = Self::default();
        chunk.read_body(body)?;
        Ok(chunk)
    }
}

// ── Message ──────────────────────────────────────────────────────────────────

/// Any message that can appear on the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Header(HeaderMessage),
    Chunk(WireChunk),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Header(_) => MessageType::Header,
            Self::Chunk(_) => MessageType::Payload,
        }
    }

    pub fn body_len(&self) -> Result<u32, WireError> {
        match self {
            Self::Header(h) => h.body_len(),
            Self::Chunk(c) => c.body_len(),
        }
    }

    /// Envelope for the current body. The size is computed here, never cached.
    pub fn envelope(&self) -> Result<Envelope, WireError> {
        Ok(Envelope::new(self.message_type(), self.body_len()?))
    }

    /// Serialize envelope and body into a single buffer.
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let envelope = self.envelope()?;
        let mut out = BytesMut::with_capacity(ENVELOPE_LEN + envelope.size() as usize);
        out.put_slice(envelope.as_bytes());
        match self {
            Self::Header(h) => h.encode_body(&mut out)?,
            Self::Chunk(c) => c.encode_body(&mut out)?,
        }
        debug_assert_eq!(out.len(), ENVELOPE_LEN + envelope.size() as usize);
        Ok(out.freeze())
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), WireError> {
        writer.write_all(&self.encode()?)?;
        Ok(())
    }

    /// Decode a body whose type has already been read from an envelope.
    ///
    /// Bytes past the end of the decoded body are ignored, so newer peers may
    /// append fields without breaking older readers.
    pub fn decode_body(message_type: MessageType, body: &[u8]) -> Result<Self, WireError> {
        match message_type {
            MessageType::Header => HeaderMessage::decode_body(body).map(Self::Header),
            MessageType::Payload => WireChunk::decode_body(body).map(Self::Chunk),
        }
    }

    /// Read one complete message from a blocking byte stream.
    ///
    /// On [`WireError::UnrecognizedType`] the body has not been consumed; the
    /// caller may skip `size` bytes to resynchronise. `max_message_size`
    /// only bounds bodies of known types, since those are buffered.
    pub fn read_from(reader: &mut impl Read, max_message_size: u32) -> Result<Self, WireError> {
        let envelope = Envelope::read_from_stream(reader)?;
        let message_type = envelope.message_type()?;
        let size = envelope.size();
        if size > max_message_size {
            return Err(WireError::MessageTooLarge {
                size,
                max: max_message_size,
            });
        }

        let mut body = wire::zeroed_buffer(size as usize)?;
        wire::read_exact(reader, &mut body)?;
        Self::decode_body(message_type, &body)
    }

    /// Decode a message held entirely in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self, WireError> {
        let envelope = Envelope::read_from_prefix(data).ok_or_else(|| {
            WireError::TruncatedMessage {
                needed: ENVELOPE_LEN - data.len(),
            }
        })?;
        let message_type = envelope.message_type()?;
        let body = &data[ENVELOPE_LEN..];
        let size = envelope.size() as usize;
        if body.len() < size {
            return Err(WireError::TruncatedMessage {
                needed: size - body.len(),
            });
        }
        Self::decode_body(message_type, &body[..size])
    }
}

impl From<HeaderMessage> for Message {
    fn from(h: HeaderMessage) -> Self {
        Self::Header(h)
    }
}

impl From<WireChunk> for Message {
    fn from(c: WireChunk) -> Self {
        Self::Chunk(c)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn payload_len(payload: &[u8]) -> Result<u32, WireError> {
    u32::try_from(payload.len()).map_err(|_| WireError::PayloadTooLarge(payload.len()))
}

/// Copy `size` payload bytes out of `rest` into a freshly sized buffer.
fn read_payload(rest: &[u8], size: u32) -> Result<Vec<u8>, WireError> {
    let size = size as usize;
    if rest.len() < size {
        return Err(WireError::TruncatedMessage {
            needed: size - rest.len(),
        });
    }
    let mut payload = Vec::new();
    payload
        .try_reserve_exact(size)
        .map_err(|_| WireError::AllocationFailure(size))?;
    payload.extend_from_slice(&rest[..size]);
    Ok(payload)
}

// ── Tests ────────────────────────────────────────────────────────────────────
