//! Resource: dispatch://session

use agentic_dispatch::{Arguments, CapabilityDescriptor, HandlerContext, HandlerResult, Output};

pub const URI: &str = "dispatch://session";

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::new(URI)
        .with_title("Session")
        .with_description("Current session: id, server identity, start time, capabilities")
        .with_mime_type("application/json")
}

pub async fn read(ctx: HandlerContext, _args: Arguments) -> HandlerResult {
    Ok(Output::structured(ctx.session().summary()))
}
