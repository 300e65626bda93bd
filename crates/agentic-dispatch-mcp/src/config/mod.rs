//! Server configuration: defaults, environment overrides, and dispatcher assembly.

use std::sync::Arc;
use std::time::Duration;

use agentic_dispatch::{
    Admission, CapabilityFlags, Dispatcher, DuplicatePolicy, ExecutorConfig, UnknownArguments,
};

use crate::transport::ResponseOrder;
use crate::types::McpResult;
use crate::{prompts, resources, tools};

pub const SERVER_NAME: &str = "agentic-dispatch-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_MAX_CONCURRENT: &str = "DISPATCH_MAX_CONCURRENT";
pub const ENV_CALL_TIMEOUT_MS: &str = "DISPATCH_CALL_TIMEOUT_MS";
pub const ENV_ADMISSION_TIMEOUT_MS: &str = "DISPATCH_ADMISSION_TIMEOUT_MS";
pub const ENV_ORDERED: &str = "DISPATCH_ORDERED";

const INSTRUCTIONS: &str = "AgenticDispatch MCP server. \
    Use tools for actions (get_time, echo, server_status). \
    Read dispatch://session for session details and \
    dispatch://capabilities/{category} to browse what is registered. \
    Use the summarize prompt for guided summaries.";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
    pub max_concurrent: usize,
    pub admission_timeout: Duration,
    /// `None` disables the per-call timeout.
    pub call_timeout: Option<Duration>,
    pub cancel_grace: Duration,
    pub reject_when_busy: bool,
    pub strict_arguments: bool,
    pub duplicate_policy: DuplicatePolicy,
    pub response_order: ResponseOrder,
    pub flags: CapabilityFlags,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        let admission_timeout = match executor.admission {
            Admission::Wait(timeout) => timeout,
            Admission::Reject => Duration::ZERO,
        };
        Self {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
            instructions: Some(INSTRUCTIONS.to_string()),
            max_concurrent: executor.max_concurrent,
            admission_timeout,
            call_timeout: executor.call_timeout,
            cancel_grace: executor.cancel_grace,
            reject_when_busy: false,
            strict_arguments: true,
            duplicate_policy: DuplicatePolicy::Reject,
            response_order: ResponseOrder::Unordered,
            flags: CapabilityFlags {
                list_changed: true,
                logging: true,
                ..Default::default()
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {name}={raw}: not a valid value");
            None
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl ServerConfig {
    /// Defaults overlaid with `DISPATCH_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env(|name| std::env::var(name).ok())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(n) = parse_var::<usize>(ENV_MAX_CONCURRENT, lookup(ENV_MAX_CONCURRENT)) {
            self.max_concurrent = n.max(1);
        }
        if let Some(ms) = parse_var::<u64>(ENV_CALL_TIMEOUT_MS, lookup(ENV_CALL_TIMEOUT_MS)) {
            self.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) =
            parse_var::<u64>(ENV_ADMISSION_TIMEOUT_MS, lookup(ENV_ADMISSION_TIMEOUT_MS))
        {
            self.admission_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_ORDERED) {
            if parse_flag(&raw) {
                self.response_order = ResponseOrder::Arrival;
            }
        }
        self
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent: self.max_concurrent.max(1),
            admission: if self.reject_when_busy {
                Admission::Reject
            } else {
                Admission::Wait(self.admission_timeout)
            },
            call_timeout: self.call_timeout,
            cancel_grace: self.cancel_grace,
        }
    }

    /// Build a dispatcher with the built-in tools, resources, and prompts.
    pub fn build_dispatcher(&self) -> McpResult<Arc<Dispatcher>> {
        let mut builder = Dispatcher::builder()
            .server_info(&self.name, &self.version)
            .duplicate_policy(self.duplicate_policy)
            .capability_flags(self.flags.clone())
            .executor_config(self.executor_config())
            .unknown_arguments(if self.strict_arguments {
                UnknownArguments::Reject
            } else {
                UnknownArguments::Ignore
            });
        if let Some(instructions) = &self.instructions {
            builder = builder.instructions(instructions);
        }
        let builder = prompts::register(tools::register(builder));

        let dispatcher = Arc::new(builder.build()?);
        // Needs the registry handle, so it goes in after build.
        resources::register(&dispatcher)?;
        dispatcher.renegotiate();
        Ok(dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentic_dispatch::CapabilityCategory;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::default().with_env(env(&[
            (ENV_MAX_CONCURRENT, "4"),
            (ENV_CALL_TIMEOUT_MS, "1500"),
            (ENV_ADMISSION_TIMEOUT_MS, "250"),
            (ENV_ORDERED, "true"),
        ]));
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.call_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.admission_timeout, Duration::from_millis(250));
        assert_eq!(config.response_order, ResponseOrder::Arrival);
    }

    #[test]
    fn test_zero_call_timeout_disables_it() {
        let config = ServerConfig::default().with_env(env(&[(ENV_CALL_TIMEOUT_MS, "0")]));
        assert_eq!(config.call_timeout, None);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let defaults = ServerConfig::default();
        let config = ServerConfig::default().with_env(env(&[
            (ENV_MAX_CONCURRENT, "lots"),
            (ENV_ORDERED, "nope"),
        ]));
        assert_eq!(config.max_concurrent, defaults.max_concurrent);
        assert_eq!(config.response_order, ResponseOrder::Unordered);
    }

    #[test]
    fn test_reject_when_busy_maps_to_admission() {
        let config = ServerConfig {
            reject_when_busy: true,
            ..Default::default()
        };
        assert_eq!(config.executor_config().admission, Admission::Reject);
    }

    #[test]
    fn test_build_dispatcher_advertises_builtins() {
        let dispatcher = ServerConfig::default().build_dispatcher().unwrap();
        let caps = dispatcher.capabilities();
        for category in CapabilityCategory::ALL {
            assert!(caps.supports(category), "{category} not advertised");
        }
        assert!(caps.list_changed(CapabilityCategory::Tool));
        assert!(dispatcher
            .registry()
            .lookup(CapabilityCategory::Tool, "get_time")
            .is_ok());
    }
}
