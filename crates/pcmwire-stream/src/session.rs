//! Session loops — the receive side turns messages into frame-addressed
//! chunks for the playback controller, the send side streams a header and
//! then every chunk handed to it.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};

use pcmwire_core::{HeaderMessage, Message, PcmChunk, SampleFormat, WireChunk};

use crate::reader::MessageReader;
use crate::writer::MessageWriter;

/// What the receive loop hands to the synchronization controller.
#[derive(Debug)]
pub enum SessionEvent {
    /// Codec configuration for the chunks that follow. Replaces any earlier one.
    Header(HeaderMessage),
    /// A chunk bound to the session's sample format, cursor at frame 0.
    Chunk(PcmChunk),
}

/// Read messages until the peer closes the stream, forwarding them in
/// arrival order.
///
/// Every chunk shares `format`. Returns `Ok(())` on a clean close and an
/// error on truncation, transport failure, or when `event_tx`'s receiver
/// is dropped.
pub async fn receive_loop<R>(
    mut reader: MessageReader<R>,
    format: Arc<SampleFormat>,
    event_tx: mpsc::Sender<SessionEvent>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    tracing::info!(%format, "receive loop starting");
    let mut chunks: u64 = 0;

    while let Some(message) = reader
        .next_message()
        .await
        .context("failed to read message")?
    {
        let event = match message {
            Message::Header(header) => {
                tracing::debug!(len = header.payload().len(), "stream header received");
                SessionEvent::Header(header)
            }
            Message::Chunk(chunk) => {
                let chunk = PcmChunk::new(chunk, format.clone());
                chunks += 1;
                tracing::trace!(
                    tv_sec = chunk.tv_sec,
                    tv_usec = chunk.tv_usec,
                    frames = chunk.frame_count(),
                    "chunk received"
                );
                SessionEvent::Chunk(chunk)
            }
        };

        if event_tx.send(event).await.is_err() {
            bail!("event receiver dropped, terminating receive loop");
        }
    }

    tracing::info!(chunks, skipped = reader.skipped(), "stream closed by peer");
    Ok(())
}

/// Sends the stream header once, then every chunk received on `chunk_rx`.
pub struct SendWorker<W> {
    writer: MessageWriter<W>,
    header: HeaderMessage,
    chunk_rx: mpsc::Receiver<WireChunk>,
    shutdown: broadcast::Receiver<()>,
}

impl<W: AsyncWrite + Unpin> SendWorker<W> {
    pub fn new(
        writer: MessageWriter<W>,
        header: HeaderMessage,
        chunk_rx: mpsc::Receiver<WireChunk>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            writer,
            header,
            chunk_rx,
            shutdown,
        }
    }

    /// Runs until shutdown or until every chunk sender is dropped, then
    /// closes the write half.
    pub async fn run(mut self) -> Result<()> {
        self.writer
            .send(&Message::Header(self.header.clone()))
            .await
            .context("failed to send stream header")?;

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("send worker shutting down");
                    break;
                }

                chunk = self.chunk_rx.recv() => {
                    let Some(chunk) = chunk else {
                        tracing::info!("chunk_tx dropped, send worker exiting");
                        break;
                    };
                    self.writer
                        .send(&Message::Chunk(chunk))
                        .await
                        .context("failed to send chunk")?;
                }
            }
        }

        self.writer
            .shutdown()
            .await
            .context("failed to close stream")?;
        Ok(())
    }
}
