//! Errors raised by the MCP layer and their JSON-RPC mapping.

use agentic_dispatch::error::error_codes;
use agentic_dispatch::{DispatchError, ErrorEnvelope};
use serde_json::Value;

use super::message::{JsonRpcError, RequestId};

#[derive(thiserror::Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    /// Failure reported by the dispatcher, already shaped as an envelope.
    #[error("{}", .0.message)]
    Dispatch(ErrorEnvelope),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        match self {
            McpError::ParseError(_) => PARSE_ERROR,
            McpError::InvalidRequest(_) => INVALID_REQUEST,
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidParams(_) => INVALID_PARAMS,
            McpError::InternalError(_) => INTERNAL_ERROR,
            McpError::Dispatch(envelope) => envelope.code.as_i32(),
            // Only outbound serialization produces `Json`.
            McpError::Transport(_) | McpError::Io(_) | McpError::Json(_) => INTERNAL_ERROR,
        }
    }

    pub fn data(&self) -> Option<Value> {
        match self {
            McpError::Dispatch(envelope) => envelope.detail.clone(),
            _ => None,
        }
    }

    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError::new(id, self.code(), self.to_string(), self.data())
    }
}

impl From<ErrorEnvelope> for McpError {
    fn from(envelope: ErrorEnvelope) -> Self {
        McpError::Dispatch(envelope)
    }
}

impl From<DispatchError> for McpError {
    fn from(e: DispatchError) -> Self {
        McpError::Dispatch(e.into_envelope())
    }
}

pub type McpResult<T> = Result<T, McpError>;
