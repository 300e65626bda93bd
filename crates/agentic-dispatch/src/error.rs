//! Error types, protocol error codes, and the error envelope returned to callers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::capability::CapabilityCategory;

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// MCP-specific error codes.
pub mod mcp_error_codes {
    pub const REQUEST_CANCELLED: i32 = -32800;
    /// Retryable: no execution slot was free within the admission window.
    pub const RESOURCE_EXHAUSTED: i32 = -32902;
}

/// Stable, machine-readable error code carried by every [`ErrorEnvelope`].
///
/// Callers branch on this, never on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    RequestCancelled,
    ResourceExhausted,
    /// A category-specific code raised explicitly by a handler.
    Custom(i32),
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        use error_codes::*;
        use mcp_error_codes::*;
        match self {
            ErrorCode::ParseError => PARSE_ERROR,
            ErrorCode::InvalidRequest => INVALID_REQUEST,
            ErrorCode::MethodNotFound => METHOD_NOT_FOUND,
            ErrorCode::InvalidParams => INVALID_PARAMS,
            ErrorCode::InternalError => INTERNAL_ERROR,
            ErrorCode::RequestCancelled => REQUEST_CANCELLED,
            ErrorCode::ResourceExhausted => RESOURCE_EXHAUSTED,
            ErrorCode::Custom(code) => code,
        }
    }

    /// Whether a client may retry the same request after backing off.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::ResourceExhausted)
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        use error_codes::*;
        use mcp_error_codes::*;
        match code {
            PARSE_ERROR => ErrorCode::ParseError,
            INVALID_REQUEST => ErrorCode::InvalidRequest,
            METHOD_NOT_FOUND => ErrorCode::MethodNotFound,
            INVALID_PARAMS => ErrorCode::InvalidParams,
            INTERNAL_ERROR => ErrorCode::InternalError,
            REQUEST_CANCELLED => ErrorCode::RequestCancelled,
            RESOURCE_EXHAUSTED => ErrorCode::ResourceExhausted,
            other => ErrorCode::Custom(other),
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.as_i32()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Error half of an invocation result: code, message, optional detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// One argument that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Failure reported by a handler.
///
/// Without an explicit code it surfaces as `InternalError`, with the message
/// and detail passed through to the client.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct HandlerError {
    pub code: Option<ErrorCode>,
    pub message: String,
    pub detail: Option<Value>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_code(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            detail: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::with_code(ErrorCode::InvalidParams, message)
    }

    pub fn cancelled() -> Self {
        Self::with_code(ErrorCode::RequestCancelled, "Request cancelled")
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        Self::new(format!("IO error: {e}"))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("JSON error: {e}"))
    }
}

/// All errors the dispatcher can produce.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Duplicate {category} name: {name}")]
    DuplicateName {
        category: CapabilityCategory,
        name: String,
    },

    #[error("Unknown {category}: {name}")]
    NotFound {
        category: CapabilityCategory,
        name: String,
    },

    #[error("Capability category not enabled: {0}")]
    CategoryDisabled(CapabilityCategory),

    #[error("Invalid arguments: {}", join_fields(.0))]
    InvalidArguments(Vec<FieldError>),

    #[error("No execution slot available after {} ms", .waited.as_millis())]
    ResourceExhausted { waited: Duration },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Handler timed out after {} ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("Handler failed: {0}")]
    Handler(HandlerError),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("Dispatcher is shutting down")]
    ShuttingDown,
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::DuplicateName { .. } => ErrorCode::InvalidRequest,
            DispatchError::NotFound { .. } => ErrorCode::InvalidParams,
            DispatchError::CategoryDisabled(_) => ErrorCode::MethodNotFound,
            DispatchError::InvalidArguments(_) => ErrorCode::InvalidParams,
            DispatchError::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            DispatchError::Cancelled => ErrorCode::RequestCancelled,
            DispatchError::TimedOut(_) => ErrorCode::InternalError,
            DispatchError::Handler(e) => e.code.unwrap_or(ErrorCode::InternalError),
            DispatchError::Panicked(_) => ErrorCode::InternalError,
            DispatchError::ShuttingDown => ErrorCode::InternalError,
        }
    }

    /// Convert into the envelope handed to the response formatter.
    pub fn into_envelope(self) -> ErrorEnvelope {
        let code = self.code();
        let detail = match &self {
            DispatchError::NotFound { category, name } => Some(json!({
                "reason": "unknown target",
                "category": category.as_str(),
                "target": name,
            })),
            DispatchError::InvalidArguments(fields) => Some(json!({ "fields": fields })),
            DispatchError::ResourceExhausted { waited } => Some(json!({
                "retryable": true,
                "waited_ms": waited.as_millis() as u64,
            })),
            DispatchError::TimedOut(limit) => Some(json!({
                "timeout_ms": limit.as_millis() as u64,
            })),
            DispatchError::Handler(e) => e.detail.clone(),
            _ => None,
        };
        let message = match self {
            DispatchError::Handler(e) if e.code.is_some() => e.message,
            // Raw panic payloads stay in the logs.
            DispatchError::Panicked(_) => "Internal error: handler fault".to_string(),
            other => other.to_string(),
        };
        ErrorEnvelope {
            code,
            message,
            detail,
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(e: HandlerError) -> Self {
        DispatchError::Handler(e)
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
