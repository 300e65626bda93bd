//! Shapes dispatcher output into MCP result bodies.
//!
//! Pure functions: no I/O, no state. Content blocks keep handler order.

use agentic_dispatch::{CapabilityDescriptor, Content, Output};
use serde_json::Value;

use crate::types::{
    PromptArgument, PromptDefinition, PromptGetResult, PromptMessage, ReadResourceResult,
    ResourceContent, ResourceDefinition, ResourceTemplateDefinition, ToolCallResult, ToolContent,
    ToolDefinition,
};

const JSON_MIME: &str = "application/json";
const TEXT_MIME: &str = "text/plain";

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| e.to_string())
}

fn tool_content(block: Content) -> ToolContent {
    match block {
        Content::Text { text } => ToolContent::Text { text },
        Content::Structured { value } => ToolContent::Text {
            text: pretty(&value),
        },
        Content::Image { data, mime_type } => ToolContent::Image { data, mime_type },
        Content::Resource {
            uri,
            mime_type,
            text,
        } => ToolContent::Resource {
            resource: ResourceContent {
                uri,
                mime_type,
                text,
                blob: None,
            },
        },
    }
}

pub fn tool_result(output: Output) -> ToolCallResult {
    ToolCallResult {
        content: output.content.into_iter().map(tool_content).collect(),
        is_error: None,
    }
}

/// Every block becomes one entry of `contents`, addressed at `uri` unless the
/// block names its own.
pub fn resource_result(uri: &str, mime_type: Option<&str>, output: Output) -> ReadResourceResult {
    let contents = output
        .content
        .into_iter()
        .map(|block| match block {
            Content::Text { text } => ResourceContent {
                uri: uri.to_string(),
                mime_type: Some(mime_type.unwrap_or(TEXT_MIME).to_string()),
                text: Some(text),
                blob: None,
            },
            Content::Structured { value } => ResourceContent {
                uri: uri.to_string(),
                mime_type: Some(mime_type.unwrap_or(JSON_MIME).to_string()),
                text: Some(pretty(&value)),
                blob: None,
            },
            Content::Image { data, mime_type } => ResourceContent {
                uri: uri.to_string(),
                mime_type: Some(mime_type),
                text: None,
                blob: Some(data),
            },
            Content::Resource {
                uri: own,
                mime_type: own_mime,
                text,
            } => ResourceContent {
                uri: own,
                mime_type: own_mime,
                text,
                blob: None,
            },
        })
        .collect();
    ReadResourceResult { contents }
}

/// Each block becomes one `user` message.
pub fn prompt_result(output: Output) -> PromptGetResult {
    PromptGetResult {
        description: output.description,
        messages: output
            .content
            .into_iter()
            .map(|block| PromptMessage {
                role: "user".to_string(),
                content: tool_content(block),
            })
            .collect(),
    }
}

pub fn tool_definition(descriptor: &CapabilityDescriptor) -> ToolDefinition {
    ToolDefinition {
        name: descriptor.name.clone(),
        title: descriptor.title.clone(),
        description: descriptor.description.clone(),
        input_schema: descriptor.input_schema(),
    }
}

pub fn resource_definition(descriptor: &CapabilityDescriptor) -> ResourceDefinition {
    ResourceDefinition {
        uri: descriptor.name.clone(),
        name: descriptor
            .title
            .clone()
            .unwrap_or_else(|| descriptor.name.clone()),
        description: descriptor.description.clone(),
        mime_type: descriptor.mime_type.clone(),
    }
}

pub fn template_definition(descriptor: &CapabilityDescriptor) -> ResourceTemplateDefinition {
    ResourceTemplateDefinition {
        uri_template: descriptor.name.clone(),
        name: descriptor
            .title
            .clone()
            .unwrap_or_else(|| descriptor.name.clone()),
        description: descriptor.description.clone(),
        mime_type: descriptor.mime_type.clone(),
    }
}

pub fn prompt_definition(descriptor: &CapabilityDescriptor) -> PromptDefinition {
    PromptDefinition {
        name: descriptor.name.clone(),
        title: descriptor.title.clone(),
        description: descriptor.description.clone(),
        arguments: descriptor
            .arguments
            .iter()
            .map(|arg| PromptArgument {
                name: arg.name.clone(),
                description: arg.description.clone(),
                required: arg.required,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentic_dispatch::ArgumentSpec;
    use serde_json::json;

    #[test]
    fn test_tool_result_keeps_block_order() {
        let output = Output::text("first")
            .push(Content::structured(json!({"n": 1})))
            .push(Content::text("last"));
        let result = tool_result(output);
        assert_eq!(result.content.len(), 3);
        assert_eq!(result.content[0], ToolContent::Text { text: "first".into() });
        assert_eq!(result.content[2], ToolContent::Text { text: "last".into() });

        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["content"][0]["type"], "text");
        assert!(wire.get("isError").is_none());
    }

    #[test]
    fn test_resource_result_addresses_request_uri() {
        let result = resource_result(
            "dispatch://session",
            Some("application/json"),
            Output::structured(json!({"ok": true})),
        );
        assert_eq!(result.contents[0].uri, "dispatch://session");
        assert_eq!(result.contents[0].mime_type.as_deref(), Some("application/json"));
        let text = result.contents[0].text.as_deref().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_resource_text_defaults_to_plain() {
        let result = resource_result("notes://1", None, Output::text("hello"));
        assert_eq!(result.contents[0].mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_image_block_becomes_blob() {
        let output = Output::new(vec![Content::Image {
            data: "aGk=".into(),
            mime_type: "image/png".into(),
        }]);
        let result = resource_result("img://1", None, output);
        assert_eq!(result.contents[0].blob.as_deref(), Some("aGk="));
        assert!(result.contents[0].text.is_none());
    }

    #[test]
    fn test_prompt_result_user_messages() {
        let result = prompt_result(Output::text("do the thing").with_description("A prompt"));
        assert_eq!(result.description.as_deref(), Some("A prompt"));
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, "user");
    }

    #[test]
    fn test_definitions_from_descriptor() {
        let descriptor = CapabilityDescriptor::new("summarize")
            .with_description("Summarize text")
            .with_argument(ArgumentSpec::string("text").required())
            .with_argument(ArgumentSpec::string("style"));

        let prompt = prompt_definition(&descriptor);
        assert_eq!(prompt.arguments.len(), 2);
        assert!(prompt.arguments[0].required);
        assert!(!prompt.arguments[1].required);

        let tool = tool_definition(&descriptor);
        assert_eq!(tool.input_schema["required"], json!(["text"]));
        let wire = serde_json::to_value(&tool).unwrap();
        assert!(wire.get("inputSchema").is_some());
    }
}
