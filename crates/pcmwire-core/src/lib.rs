//! pcmwire-core — wire format, message codec and frame-addressed audio chunks.
//! The stream adapters in pcmwire-stream build on this crate.

pub mod config;
pub mod format;
pub mod message;
pub mod pcm;
pub mod wire;

pub use format::SampleFormat;
pub use message::{HeaderMessage, Message, WireChunk};
pub use pcm::PcmChunk;
pub use wire::{Envelope, MessageType, WireError};
