//! Built-in MCP tools.

pub mod echo;
pub mod get_time;
pub mod server_status;

use agentic_dispatch::{handler_fn, DispatcherBuilder};

/// Add every built-in tool to `builder`, in listing order.
pub fn register(builder: DispatcherBuilder) -> DispatcherBuilder {
    builder
        .tool(get_time::descriptor(), handler_fn(get_time::execute))
        .tool(echo::descriptor(), handler_fn(echo::execute))
        .tool(server_status::descriptor(), handler_fn(server_status::execute))
}
