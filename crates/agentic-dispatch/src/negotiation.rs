//! Capability negotiation: which categories the server advertises.

use crate::capabilities::{
    LoggingCapability, PromptsCapability, ResourcesCapability, ServerCapabilities,
    ToolsCapability,
};
use crate::capability::CapabilityCategory;
use crate::registry::Registry;

/// Explicit overrides supplied by the embedding application.
///
/// `None` means "decide from the registry": a category is advertised when it
/// has at least one entry. `Some(false)` always hides it, `Some(true)` always
/// advertises it, even when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub tools: Option<bool>,
    pub resources: Option<bool>,
    pub prompts: Option<bool>,
    pub resources_subscribe: bool,
    pub list_changed: bool,
    pub logging: bool,
}

impl CapabilityFlags {
    pub fn explicit(&self, category: CapabilityCategory) -> Option<bool> {
        match category {
            CapabilityCategory::Tool => self.tools,
            CapabilityCategory::Resource => self.resources,
            CapabilityCategory::Prompt => self.prompts,
        }
    }

    pub fn set(mut self, category: CapabilityCategory, enabled: bool) -> Self {
        let slot = match category {
            CapabilityCategory::Tool => &mut self.tools,
            CapabilityCategory::Resource => &mut self.resources,
            CapabilityCategory::Prompt => &mut self.prompts,
        };
        *slot = Some(enabled);
        self
    }

    pub fn enable(self, category: CapabilityCategory) -> Self {
        self.set(category, true)
    }

    pub fn disable(self, category: CapabilityCategory) -> Self {
        self.set(category, false)
    }
}

fn advertised(registry: &Registry, flags: &CapabilityFlags, category: CapabilityCategory) -> bool {
    flags
        .explicit(category)
        .unwrap_or_else(|| !registry.is_empty(category))
}

/// Compute the advertisement from registry population and explicit flags.
pub fn negotiate(registry: &Registry, flags: &CapabilityFlags) -> ServerCapabilities {
    let list_changed = flags.list_changed;

    let caps = ServerCapabilities {
        experimental: None,
        logging: flags.logging.then_some(LoggingCapability {}),
        tools: advertised(registry, flags, CapabilityCategory::Tool)
            .then_some(ToolsCapability { list_changed }),
        resources: advertised(registry, flags, CapabilityCategory::Resource).then_some(
            ResourcesCapability {
                subscribe: flags.resources_subscribe,
                list_changed,
            },
        ),
        prompts: advertised(registry, flags, CapabilityCategory::Prompt)
            .then_some(PromptsCapability { list_changed }),
    };

    tracing::debug!(
        tools = caps.tools.is_some(),
        resources = caps.resources.is_some(),
        prompts = caps.prompts.is_some(),
        "Negotiated server capabilities"
    );

    caps
}
