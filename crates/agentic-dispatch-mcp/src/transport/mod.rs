//! Transport layer for MCP communication.

pub mod framing;
pub mod sequencer;
pub mod stdio;

pub use sequencer::{ResponseOrder, Sequencer};
pub use stdio::StdioTransport;
