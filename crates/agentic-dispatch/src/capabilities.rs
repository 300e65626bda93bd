//! Server capability advertisement sent during the initialization handshake.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capability::CapabilityCategory;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingCapability {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    #[serde(default)]
    pub subscribe: bool,
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

impl ServerCapabilities {
    /// Whether the category was advertised to the client.
    pub fn supports(&self, category: CapabilityCategory) -> bool {
        match category {
            CapabilityCategory::Tool => self.tools.is_some(),
            CapabilityCategory::Resource => self.resources.is_some(),
            CapabilityCategory::Prompt => self.prompts.is_some(),
        }
    }

    /// Whether `notifications/<category>/list_changed` may be sent.
    pub fn list_changed(&self, category: CapabilityCategory) -> bool {
        match category {
            CapabilityCategory::Tool => self.tools.as_ref().is_some_and(|c| c.list_changed),
            CapabilityCategory::Resource => {
                self.resources.as_ref().is_some_and(|c| c.list_changed)
            }
            CapabilityCategory::Prompt => self.prompts.as_ref().is_some_and(|c| c.list_changed),
        }
    }

    pub fn resources_subscribe(&self) -> bool {
        self.resources.as_ref().is_some_and(|c| c.subscribe)
    }
}
