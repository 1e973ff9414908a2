//! pcmwire integration test harness.
//!
//! Producer and consumer run as separate tasks connected by an in-memory
//! duplex pipe or a loopback TCP socket, the same way two endpoints would be
//! connected by a real transport.
//!
//!   RUST_LOG=pcmwire_stream=trace cargo test --test integration

use std::sync::Arc;

use pcmwire_core::config::PcmwireConfig;
use pcmwire_core::{HeaderMessage, PcmChunk, SampleFormat, WireChunk};
use pcmwire_stream::{receive_loop, MessageReader, MessageWriter, SendWorker, SessionEvent};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

mod failures;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Route tracing output through the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 48 kHz / 16 bit / stereo, shared by every chunk of a session.
pub fn stereo16() -> Arc<SampleFormat> {
    Arc::new(SampleFormat::standard())
}

/// `frames` frames of stereo 16-bit audio, every byte of frame `i` set to `i as u8`.
pub fn ramp_chunk(tv_sec: i32, tv_usec: i32, frames: u32) -> WireChunk {
    let payload = (0..frames).flat_map(|i| [i as u8; 4]).collect();
    WireChunk::new(tv_sec, tv_usec, payload)
}

/// Handles to a running producer (send worker) and consumer (receive loop).
pub struct Session {
    pub chunk_tx: mpsc::Sender<WireChunk>,
    pub events: mpsc::Receiver<SessionEvent>,
    pub shutdown: broadcast::Sender<()>,
    pub sender: JoinHandle<anyhow::Result<()>>,
    pub receiver: JoinHandle<anyhow::Result<()>>,
}

/// Start a send worker on `write_half` and a receive loop on `read_half`,
/// configured with the defaults.
pub fn start_session<R, W>(read_half: R, write_half: W, header: HeaderMessage) -> Session
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    start_session_with(&PcmwireConfig::default(), read_half, write_half, header)
}

pub fn start_session_with<R, W>(
    config: &PcmwireConfig,
    read_half: R,
    write_half: W,
    header: HeaderMessage,
) -> Session
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (chunk_tx, chunk_rx) = mpsc::channel(16);
    let (event_tx, events) = mpsc::channel(16);
    let (shutdown, shutdown_rx) = broadcast::channel(1);

    let worker = SendWorker::new(MessageWriter::new(write_half), header, chunk_rx, shutdown_rx);
    let sender = tokio::spawn(worker.run());
    let receiver = tokio::spawn(receive_loop(
        MessageReader::with_config(read_half, &config.wire),
        config.stream.shared_format(),
        event_tx,
    ));

    Session {
        chunk_tx,
        events,
        shutdown,
        sender,
        receiver,
    }
}

/// Next event, which must be a chunk.
pub async fn expect_chunk(events: &mut mpsc::Receiver<SessionEvent>) -> PcmChunk {
    match events.recv().await {
        Some(SessionEvent::Chunk(chunk)) => chunk,
        other => panic!("expected chunk event, got {other:?}"),
    }
}

/// Next event, which must be a header.
pub async fn expect_header(events: &mut mpsc::Receiver<SessionEvent>) -> HeaderMessage {
    match events.recv().await {
        Some(SessionEvent::Header(header)) => header,
        other => panic!("expected header event, got {other:?}"),
    }
}
