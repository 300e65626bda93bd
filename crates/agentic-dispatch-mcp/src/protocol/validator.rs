//! Structural checks on inbound JSON-RPC requests.

use crate::types::{JsonRpcRequest, McpError, McpResult, RequestId, JSONRPC_VERSION};

pub fn validate_request(request: &JsonRpcRequest) -> McpResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(McpError::InvalidRequest(format!(
            "Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    if request.method.is_empty() {
        return Err(McpError::InvalidRequest(
            "Method name must not be empty".to_string(),
        ));
    }

    if request.id == RequestId::Null {
        return Err(McpError::InvalidRequest(
            "Request id must not be null".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(jsonrpc: &str, id: RequestId, method: &str) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: jsonrpc.to_string(),
            id,
            method: method.to_string(),
            params: None,
        }
    }

    #[test]
    fn test_well_formed_request_passes() {
        assert!(validate_request(&request("2.0", RequestId::Number(1), "ping")).is_ok());
    }

    #[test]
    fn test_wrong_version_rejected() {
        let err = validate_request(&request("1.0", RequestId::Number(1), "ping")).unwrap_err();
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn test_empty_method_and_null_id_rejected() {
        assert!(validate_request(&request("2.0", RequestId::Number(1), "")).is_err());
        assert!(validate_request(&request("2.0", RequestId::Null, "ping")).is_err());
    }
}
