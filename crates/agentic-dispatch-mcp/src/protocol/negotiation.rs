//! Handshake state: protocol version agreement and the client's identity.

use agentic_dispatch::SessionState;

use crate::types::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, MCP_VERSION,
    SUPPORTED_VERSIONS,
};

/// What the client told us during `initialize`.
#[derive(Debug, Clone, Default)]
pub struct HandshakeState {
    pub client: ClientCapabilities,
    pub client_info: Option<Implementation>,
    pub protocol_version: Option<String>,
    pub initialized: bool,
}

impl HandshakeState {
    /// Record the client's parameters and build the `initialize` result from
    /// the session's negotiated capabilities.
    pub fn negotiate(&mut self, params: InitializeParams, session: &SessionState) -> InitializeResult {
        let version = if SUPPORTED_VERSIONS.contains(&params.protocol_version.as_str()) {
            params.protocol_version.clone()
        } else {
            tracing::warn!(
                "Client requested protocol version {}, server supports {}. Proceeding with server version.",
                params.protocol_version,
                MCP_VERSION
            );
            MCP_VERSION.to_string()
        };

        tracing::info!(
            "Initialized with client: {} v{} (protocol {version})",
            params.client_info.name,
            params.client_info.version
        );

        self.client = params.capabilities;
        self.client_info = Some(params.client_info);
        self.protocol_version = Some(version.clone());

        InitializeResult {
            protocol_version: version,
            capabilities: session.capabilities().clone(),
            server_info: Implementation {
                name: session.server_name().to_string(),
                version: session.server_version().to_string(),
            },
            instructions: session.instructions().map(str::to_string),
        }
    }

    pub fn mark_initialized(&mut self) {
        if self.protocol_version.is_none() {
            tracing::debug!("initialized notification before initialize");
        }
        self.initialized = true;
        tracing::info!("MCP handshake complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentic_dispatch::{ServerCapabilities, ServerIdentity};

    fn params(version: &str) -> InitializeParams {
        InitializeParams {
            protocol_version: version.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "test-client".to_string(),
                version: "1.0".to_string(),
            },
        }
    }

    #[test]
    fn test_supported_version_echoed() {
        let session = SessionState::new(ServerIdentity::default(), ServerCapabilities::default());
        let mut state = HandshakeState::default();
        let result = state.negotiate(params("2024-11-05"), &session);
        assert_eq!(result.protocol_version, "2024-11-05");
        assert_eq!(state.client_info.unwrap().name, "test-client");
    }

    #[test]
    fn test_unknown_version_answered_with_own() {
        let session = SessionState::new(ServerIdentity::default(), ServerCapabilities::default());
        let mut state = HandshakeState::default();
        let result = state.negotiate(params("1999-01-01"), &session);
        assert_eq!(result.protocol_version, MCP_VERSION);
        assert_eq!(result.server_info.name, "agentic-dispatch");
    }
}
