//! pcmwire-stream — runs the pcmwire envelope codec over async byte streams.
//!
//! The transport is whatever the caller hands in: anything implementing
//! tokio's `AsyncRead`/`AsyncWrite` (TCP, Unix sockets, in-memory pipes).

pub mod reader;
pub mod session;
pub mod writer;

pub use reader::MessageReader;
pub use session::{receive_loop, SendWorker, SessionEvent};
pub use writer::MessageWriter;
