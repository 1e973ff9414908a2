//! Message reader — envelope, bounded body read, dispatch by type.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use zerocopy::FromBytes;

use pcmwire_core::config::WireConfig;
use pcmwire_core::wire::{self, Envelope, WireError, DEFAULT_MAX_MESSAGE_SIZE, ENVELOPE_LEN};
use pcmwire_core::Message;

/// Reads whole messages from an async byte stream.
///
/// Envelopes with an unknown type tag are skipped (their body is consumed
/// and discarded) so older readers keep working when peers add messages.
/// The size limit applies to known types only.
pub struct MessageReader<R> {
    inner: R,
    max_message_size: u32,
    skipped: u64,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            skipped: 0,
        }
    }

    pub fn with_config(inner: R, config: &WireConfig) -> Self {
        Self::new(inner).with_max_message_size(config.max_message_size)
    }

    pub fn with_max_message_size(mut self, max_message_size: u32) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Number of unrecognized messages skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the next recognized message.
    ///
    /// Returns `Ok(None)` when the stream closes cleanly between messages.
    /// A close inside a message is [`WireError::TruncatedMessage`].
    /// Unknown types are discarded without buffering, whatever their size.
    pub async fn next_message(&mut self) -> Result<Option<Message>, WireError> {
        loop {
            let Some(envelope) = self.read_envelope().await? else {
                return Ok(None);
            };

            let size = envelope.size();
            let message_type = match envelope.message_type() {
                Ok(t) => t,
                Err(WireError::UnrecognizedType { type_tag, size }) => {
                    self.discard(size).await?;
                    self.skipped += 1;
                    tracing::warn!(type_tag, size, "unrecognized message type, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if size > self.max_message_size {
                return Err(WireError::MessageTooLarge {
                    size,
                    max: self.max_message_size,
                });
            }

            let mut body = wire::zeroed_buffer(size as usize)?;
            let filled = self.fill(&mut body).await?;
            if filled < body.len() {
                return Err(WireError::TruncatedMessage {
                    needed: body.len() - filled,
                });
            }

            let message = Message::decode_body(message_type, &body)?;
            tracing::trace!(?message_type, size, "message read");
            return Ok(Some(message));
        }
    }

    /// Read an envelope, or `None` on EOF before its first byte.
    async fn read_envelope(&mut self) -> Result<Option<Envelope>, WireError> {
        let mut raw = [0u8; ENVELOPE_LEN];
        match self.fill(&mut raw).await? {
            0 => Ok(None),
            ENVELOPE_LEN => Ok(Envelope::read_from(&raw[..])),
            filled => Err(WireError::TruncatedMessage {
                needed: ENVELOPE_LEN - filled,
            }),
        }
    }

    /// Read until `buf` is full or the stream ends. Returns the bytes read.
    async fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Drop `size` body bytes without buffering them.
    async fn discard(&mut self, size: u32) -> Result<(), WireError> {
        let size = u64::from(size);
        let mut body = (&mut self.inner).take(size);
        let skipped = tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
        if skipped < size {
            return Err(WireError::TruncatedMessage {
                needed: (size - skipped) as usize,
            });
        }
        Ok(())
    }
}
