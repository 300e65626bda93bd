//! Tool `echo`: return the message, optionally repeated.

use serde_json::json;

use agentic_dispatch::{
    Arguments, ArgumentSpec, CapabilityDescriptor, HandlerContext, HandlerError, HandlerResult,
    Output,
};

const MAX_REPEAT: i64 = 100;

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::new("echo")
        .with_description("Echo a message back")
        .with_argument(
            ArgumentSpec::string("message")
                .describe("Text to echo")
                .required(),
        )
        .with_argument(
            ArgumentSpec::integer("repeat")
                .describe("How many times to repeat the message (1-100)")
                .default_value(json!(1)),
        )
}

pub async fn execute(_ctx: HandlerContext, args: Arguments) -> HandlerResult {
    let message = args
        .get_str("message")
        .ok_or_else(|| HandlerError::invalid_params("'message' argument is required"))?;
    let repeat = args.get_i64("repeat").unwrap_or(1);
    if !(1..=MAX_REPEAT).contains(&repeat) {
        return Err(HandlerError::invalid_params(format!(
            "'repeat' must be between 1 and {MAX_REPEAT}, got {repeat}"
        )));
    }

    let lines = vec![message; repeat as usize];
    Ok(Output::text(lines.join("\n")))
}
