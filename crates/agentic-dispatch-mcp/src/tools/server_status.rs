//! Tool `server_status`: session identity, uptime, and advertised capabilities.

use agentic_dispatch::{Arguments, CapabilityDescriptor, HandlerContext, HandlerResult, Output};

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::new("server_status")
        .with_description("Report session id, uptime, and advertised capabilities")
}

pub async fn execute(ctx: HandlerContext, _args: Arguments) -> HandlerResult {
    Ok(Output::structured(ctx.session().summary()))
}
