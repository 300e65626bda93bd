//! Built-in MCP resources.

pub mod capabilities;
pub mod session;

use std::sync::Arc;

use agentic_dispatch::{handler_fn, DispatchResult, Dispatcher};

/// Register the built-in resources on a running dispatcher.
///
/// The capability listing reads the dispatcher's own registry, so this runs
/// after `build`; call [`Dispatcher::renegotiate`] afterwards.
pub fn register(dispatcher: &Dispatcher) -> DispatchResult<()> {
    dispatcher.add_resource(session::descriptor(), handler_fn(session::read))?;
    dispatcher.add_resource(
        capabilities::descriptor(),
        Arc::new(capabilities::CapabilityListing::new(dispatcher.registry_handle())),
    )?;
    Ok(())
}
