//! Resource template: dispatch://capabilities/{category}

use std::sync::Weak;

use async_trait::async_trait;
use serde_json::json;

use agentic_dispatch::{
    Arguments, ArgumentSpec, CapabilityCategory, CapabilityDescriptor, Handler, HandlerContext,
    HandlerError, HandlerResult, Output, Registry,
};

pub const URI_TEMPLATE: &str = "dispatch://capabilities/{category}";

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::new(URI_TEMPLATE)
        .with_title("Registered capabilities")
        .with_description("Everything registered in one category: tools, resources, or prompts")
        .with_mime_type("application/json")
        .with_argument(
            ArgumentSpec::string("category")
                .describe("tools, resources, or prompts")
                .required(),
        )
}

/// Lists one category of the registry it is registered in.
pub struct CapabilityListing {
    registry: Weak<Registry>,
}

impl CapabilityListing {
    pub fn new(registry: Weak<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Handler for CapabilityListing {
    async fn call(&self, _ctx: HandlerContext, args: Arguments) -> HandlerResult {
        let raw = args.get_str("category").unwrap_or_default();
        let category: CapabilityCategory = raw
            .parse()
            .map_err(|_| HandlerError::invalid_params(format!("Unknown category: {raw}")))?;
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| HandlerError::new("Registry no longer available"))?;

        let list = registry.list(category);
        let items: Vec<_> = list
            .descriptors()
            .map(|d| {
                json!({
                    "name": d.name,
                    "title": d.title,
                    "description": d.description,
                    "arguments": d.arguments.iter().map(|a| &a.name).collect::<Vec<_>>(),
                })
            })
            .collect();

        Ok(Output::structured(json!({
            "category": category.as_str(),
            "count": items.len(),
            "items": items,
        })))
    }
}
