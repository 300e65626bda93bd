//! Message framing for newline-delimited JSON.

use serde_json::Value;

use crate::types::{JsonRpcMessage, JsonRpcNotification, McpError, McpResult};

/// Parse a single line of text as a JSON-RPC message.
///
/// Malformed JSON is a `ParseError`; well-formed JSON of the wrong shape is
/// an `InvalidRequest`.
pub fn parse_message(line: &str) -> McpResult<JsonRpcMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(McpError::ParseError("Empty message".to_string()));
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| McpError::ParseError(e.to_string()))?;
    JsonRpcMessage::from_value(value)
}

/// Serialize a value to a JSON line (with trailing newline).
pub fn frame_message(value: &Value) -> McpResult<String> {
    let mut json = serde_json::to_string(value).map_err(McpError::Json)?;
    json.push('\n');
    Ok(json)
}

/// Server-initiated notification as a JSON value, ready for framing.
pub fn notification(method: &str, params: Option<Value>) -> McpResult<Value> {
    Ok(serde_json::to_value(JsonRpcNotification::new(method, params))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_line_is_parse_error() {
        let err = parse_message("   ").unwrap_err();
        assert_eq!(err.code(), -32700);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(parse_message("{not json"), Err(McpError::ParseError(_))));
    }

    #[test]
    fn test_wrong_shape_is_invalid_request() {
        let err = parse_message(r#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert_eq!(err.code(), -32600);
        let err = parse_message(r#"{"jsonrpc":"2.0","id":1.5,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn test_frame_is_single_line() {
        let framed = frame_message(&json!({"a": "multi\nline"})).unwrap();
        assert!(framed.ends_with('\n'));
        assert_eq!(framed.matches('\n').count(), 1);
    }

    #[test]
    fn test_notification_has_no_id() {
        let value = notification("notifications/tools/list_changed", None).unwrap();
        assert_eq!(value["method"], "notifications/tools/list_changed");
        assert!(value.get("id").is_none());
    }
}
