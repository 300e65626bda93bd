//! Built-in MCP prompts.

pub mod summarize;

use agentic_dispatch::{handler_fn, DispatcherBuilder};

pub fn register(builder: DispatcherBuilder) -> DispatcherBuilder {
    builder.prompt(summarize::descriptor(), handler_fn(summarize::expand))
}
