//! MCP protocol handling: JSON-RPC routing onto the dispatcher.

pub mod formatter;
pub mod handler;
pub mod negotiation;
pub mod validator;

pub use handler::ProtocolHandler;
