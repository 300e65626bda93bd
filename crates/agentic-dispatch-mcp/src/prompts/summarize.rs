//! Prompt `summarize`: guide for summarizing a piece of text.

use serde_json::json;

use agentic_dispatch::{
    Arguments, ArgumentSpec, CapabilityDescriptor, HandlerContext, HandlerError, HandlerResult,
    Output,
};

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::new("summarize")
        .with_title("Summarize text")
        .with_description("Guide for summarizing a piece of text")
        .with_argument(
            ArgumentSpec::string("text")
                .describe("The text to summarize")
                .required(),
        )
        .with_argument(
            ArgumentSpec::string("style")
                .describe("concise, detailed, or bullets")
                .default_value(json!("concise")),
        )
}

pub async fn expand(_ctx: HandlerContext, args: Arguments) -> HandlerResult {
    let text = args
        .get_str("text")
        .ok_or_else(|| HandlerError::invalid_params("'text' argument is required"))?;
    let style = args.get_str("style").unwrap_or("concise");

    let guidance = match style {
        "concise" => "Write two or three sentences capturing the main point.",
        "detailed" => "Cover each main point in its own short paragraph.",
        "bullets" => "List the key points as short bullet items.",
        other => {
            return Err(HandlerError::invalid_params(format!(
                "Unknown style '{other}', expected concise, detailed, or bullets"
            )))
        }
    };

    let prompt = format!("Summarize the following text.\n\n{guidance}\n\n---\n{text}");
    Ok(Output::text(prompt).with_description(format!("Summary ({style})")))
}
