//! AgenticDispatch: transport-agnostic dispatch core for MCP servers: capability registries, negotiation, argument validation, and bounded handler execution.

pub mod arguments;
pub mod capabilities;
pub mod capability;
pub mod content;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod handler;
pub mod negotiation;
pub mod registry;
pub mod session;
pub mod template;
pub mod validate;

pub use arguments::Arguments;
pub use capabilities::{
    LoggingCapability, PromptsCapability, ResourcesCapability, ServerCapabilities,
    ToolsCapability,
};
pub use capability::{
    ArgumentKind, ArgumentSpec, Capability, CapabilityCategory, CapabilityDescriptor,
};
pub use content::{Content, InvocationResult, Output};
pub use dispatcher::{Dispatcher, DispatcherBuilder, InflightTicket, InvocationRequest};
pub use error::{
    DispatchError, DispatchResult, ErrorCode, ErrorEnvelope, FieldError, HandlerError,
};
pub use executor::{Admission, Executor, ExecutorConfig};
pub use handler::{handler_fn, Handler, HandlerContext, HandlerResult, RequestKey};
pub use negotiation::{negotiate, CapabilityFlags};
pub use registry::{CapabilityList, DuplicatePolicy, Registry};
pub use session::{ServerIdentity, SessionState};
pub use template::match_uri_template;
pub use validate::{validate_arguments, UnknownArguments};
