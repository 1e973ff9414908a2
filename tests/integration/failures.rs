use tokio::io::AsyncWriteExt;
use zerocopy::AsBytes;

use pcmwire_core::config::PcmwireConfig;
use pcmwire_core::{Envelope, Message, MessageType, WireError};

use crate::*;

/// Run a receive loop over raw bytes written by the test, then closed.
async fn receive_raw(bytes: Vec<u8>) -> (anyhow::Result<()>, Vec<SessionEvent>) {
    receive_raw_with(&PcmwireConfig::default(), bytes).await
}

async fn receive_raw_with(
    config: &PcmwireConfig,
    bytes: Vec<u8>,
) -> (anyhow::Result<()>, Vec<SessionEvent>) {
    let (mut write_half, read_half) = tokio::io::duplex(64 * 1024);
    let (event_tx, mut events) = mpsc::channel(16);
    let receiver = tokio::spawn(receive_loop(
        MessageReader::with_config(read_half, &config.wire),
        config.stream.shared_format(),
        event_tx,
    ));

    write_half.write_all(&bytes).await.unwrap();
    write_half.shutdown().await.unwrap();
    drop(write_half);

    let result = receiver.await.unwrap();
    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        received.push(event);
    }
    (result, received)
}

fn wire_error(result: anyhow::Result<()>) -> WireError {
    result
        .unwrap_err()
        .downcast::<WireError>()
        .expect("error should carry a WireError")
}

/// Chunk declares 10 payload bytes, the peer closes after 5.
#[tokio::test]
async fn test_truncated_chunk_fails_session() {
    init_tracing();
    let mut bytes = Message::Chunk(WireChunk::new(1, 0, vec![0xab; 10]))
        .encode()
        .unwrap()
        .to_vec();
    bytes.truncate(bytes.len() - 5);

    let (result, events) = receive_raw(bytes).await;
    assert!(events.is_empty());
    assert!(matches!(
        wire_error(result),
        WireError::TruncatedMessage { .. }
    ));
}

/// Messages before the truncation point are still delivered.
#[tokio::test]
async fn test_truncation_after_complete_messages() {
    init_tracing();
    let mut bytes = Message::Header(HeaderMessage::new(b"cfg".to_vec()))
        .encode()
        .unwrap()
        .to_vec();
    bytes.extend_from_slice(Envelope::new(MessageType::Payload, 40).as_bytes());
    bytes.extend_from_slice(&[0; 3]);

    let (result, events) = receive_raw(bytes).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SessionEvent::Header(_)));
    assert!(matches!(
        wire_error(result),
        WireError::TruncatedMessage { .. }
    ));
}

/// Unknown type 7 between two chunks: skipped, both chunks arrive.
#[tokio::test]
async fn test_unrecognized_type_is_skipped() {
    init_tracing();
    let mut bytes = Message::Chunk(ramp_chunk(1, 0, 8)).encode().unwrap().to_vec();
    bytes.extend_from_slice(Envelope { type_tag: 7, size: 6 }.as_bytes());
    bytes.extend_from_slice(b"future");
    bytes.extend_from_slice(&Message::Chunk(ramp_chunk(2, 0, 8)).encode().unwrap());

    let (result, events) = receive_raw(bytes).await;
    result.unwrap();
    let secs: Vec<i32> = events
        .iter()
        .map(|e| match e {
            SessionEvent::Chunk(c) => c.tv_sec,
            SessionEvent::Header(_) => panic!("unexpected header"),
        })
        .collect();
    assert_eq!(secs, vec![1, 2]);
}

/// An unknown message larger than the size limit is still skipped.
#[tokio::test]
async fn test_large_unknown_message_does_not_end_session() {
    init_tracing();
    let mut config = PcmwireConfig::default();
    config.wire.max_message_size = 1024;

    let mut bytes = Envelope { type_tag: 7, size: 2048 }.as_bytes().to_vec();
    bytes.extend_from_slice(&[0x55; 2048]);
    bytes.extend_from_slice(&Message::Chunk(ramp_chunk(3, 0, 16)).encode().unwrap());

    let (result, events) = receive_raw_with(&config, bytes).await;
    result.unwrap();
    assert_eq!(events.len(), 1);
    let SessionEvent::Chunk(chunk) = &events[0] else {
        panic!("expected a chunk");
    };
    assert_eq!(chunk.tv_sec, 3);
    assert_eq!(chunk.frame_count(), 16);
}

/// A known message larger than the size limit ends the session.
#[tokio::test]
async fn test_known_message_over_limit_fails_session() {
    init_tracing();
    let mut config = PcmwireConfig::default();
    config.wire.max_message_size = 1024;

    let bytes = Message::Chunk(ramp_chunk(3, 0, 512)).encode().unwrap().to_vec();
    let (result, events) = receive_raw_with(&config, bytes).await;
    assert!(events.is_empty());
    assert_eq!(
        wire_error(result),
        WireError::MessageTooLarge {
            size: 12 + 512 * 4,
            max: 1024
        }
    );
}

/// An envelope announcing a body beyond the limit ends the session before
/// anything is allocated for it.
#[tokio::test]
async fn test_oversized_envelope_fails_session() {
    init_tracing();
    let bytes = Envelope::new(MessageType::Header, u32::MAX).as_bytes().to_vec();
    let (result, events) = receive_raw(bytes).await;
    assert!(events.is_empty());
    assert!(matches!(
        wire_error(result),
        WireError::MessageTooLarge { size: u32::MAX, .. }
    ));
}

/// Unnormalized microseconds are carried through unchanged.
#[tokio::test]
async fn test_unnormalized_usec_passes_through() {
    init_tracing();
    let bytes = Message::Chunk(ramp_chunk(10, 2_500_000, 48))
        .encode()
        .unwrap()
        .to_vec();
    let (result, mut events) = receive_raw(bytes).await;
    result.unwrap();

    let Some(SessionEvent::Chunk(chunk)) = events.pop() else {
        panic!("expected a chunk");
    };
    assert_eq!(chunk.tv_usec, 2_500_000);
    assert_eq!(chunk.time_point().timestamp_micros(), 12_500_000);
}
