//! Tool `get_time`: current UTC time in a chosen format.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use agentic_dispatch::{
    Arguments, ArgumentSpec, CapabilityDescriptor, HandlerContext, HandlerError, HandlerResult,
    Output,
};

pub const DEFAULT_FORMAT: &str = "RFC3339";

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::new("get_time")
        .with_title("Current time")
        .with_description("Return the current UTC time")
        .with_argument(
            ArgumentSpec::string("format")
                .describe("RFC3339, Unix, UnixMillis, or a strftime pattern such as %Y-%m-%d")
                .default_value(json!(DEFAULT_FORMAT)),
        )
}

pub async fn execute(_ctx: HandlerContext, args: Arguments) -> HandlerResult {
    let format = args.get_str("format").unwrap_or(DEFAULT_FORMAT);
    Ok(Output::text(format_time(Utc::now(), format)?))
}

/// Render `now` per `format`. Named formats are matched case-insensitively.
pub fn format_time(now: DateTime<Utc>, format: &str) -> Result<String, HandlerError> {
    match format.to_ascii_lowercase().as_str() {
        "rfc3339" => return Ok(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        "unix" => return Ok(now.timestamp().to_string()),
        "unixmillis" => return Ok(now.timestamp_millis().to_string()),
        _ => {}
    }

    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(HandlerError::invalid_params(format!(
            "Invalid time format: {format}"
        )));
    }
    Ok(now.format_with_items(items.into_iter()).to_string())
}
