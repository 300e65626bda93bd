//! AgenticDispatch MCP Server: JSON-RPC front end for the dispatch core.

pub mod config;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::ServerConfig;
pub use protocol::ProtocolHandler;
pub use transport::{ResponseOrder, StdioTransport};
