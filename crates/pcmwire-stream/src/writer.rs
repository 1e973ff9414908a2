//! Message writer — encode and flush one message at a time.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use pcmwire_core::{Message, WireError};

pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encode `message` (envelope size computed from the body) and write it.
    pub async fn send(&mut self, message: &Message) -> Result<(), WireError> {
        let bytes = message.encode()?;
        self.inner.write_all(&bytes).await?;
        self.inner.flush().await?;
        tracing::trace!(
            message_type = ?message.message_type(),
            len = bytes.len(),
            "message written"
        );
        Ok(())
    }

    /// Shut down the write half so the peer sees a clean end of stream.
    pub async fn shutdown(&mut self) -> Result<(), WireError> {
        self.inner.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
