//! Process-wide session state: identity, start time, negotiated capabilities.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::capabilities::ServerCapabilities;

/// Name, version, and optional usage instructions reported to clients.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: "agentic-dispatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

/// Read-only state shared with every handler via `Arc<SessionState>`.
///
/// Handlers never mutate it. Data a handler needs to mutate belongs in the
/// handler itself.
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: Uuid,
    identity: ServerIdentity,
    started_at: DateTime<Utc>,
    started: Instant,
    capabilities: ServerCapabilities,
}

impl SessionState {
    pub fn new(identity: ServerIdentity, capabilities: ServerCapabilities) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            identity,
            started_at: Utc::now(),
            started: Instant::now(),
            capabilities,
        }
    }

    /// Same session, new advertisement. Used by explicit renegotiation.
    pub fn with_capabilities(&self, capabilities: ServerCapabilities) -> Self {
        Self {
            capabilities,
            ..self.clone()
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn server_name(&self) -> &str {
        &self.identity.name
    }

    pub fn server_version(&self) -> &str {
        &self.identity.version
    }

    pub fn instructions(&self) -> Option<&str> {
        self.identity.instructions.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn summary(&self) -> Value {
        json!({
            "session_id": self.session_id.to_string(),
            "server": {
                "name": self.identity.name,
                "version": self.identity.version,
            },
            "started_at": self.started_at.to_rfc3339(),
            "uptime_secs": self.uptime().as_secs(),
            "capabilities": self.capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renegotiation_keeps_identity() {
        let state = SessionState::new(ServerIdentity::default(), ServerCapabilities::default());
        let caps = ServerCapabilities {
            tools: Some(Default::default()),
            ..Default::default()
        };
        let next = state.with_capabilities(caps.clone());
        assert_eq!(next.session_id(), state.session_id());
        assert_eq!(next.started_at(), state.started_at());
        assert_eq!(next.capabilities(), &caps);
    }

    #[test]
    fn test_summary_fields() {
        let state = SessionState::new(ServerIdentity::default(), ServerCapabilities::default());
        let summary = state.summary();
        assert_eq!(summary["server"]["name"], "agentic-dispatch");
        assert!(summary["started_at"].as_str().is_some());
    }
}
