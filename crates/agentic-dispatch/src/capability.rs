//! Capability descriptors: what a tool, resource, or prompt declares about itself.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::handler::Handler;

/// The three independent capability namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityCategory {
    Tool,
    Resource,
    Prompt,
}

impl CapabilityCategory {
    pub const ALL: [CapabilityCategory; 3] = [
        CapabilityCategory::Tool,
        CapabilityCategory::Resource,
        CapabilityCategory::Prompt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityCategory::Tool => "tool",
            CapabilityCategory::Resource => "resource",
            CapabilityCategory::Prompt => "prompt",
        }
    }
}

impl fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CapabilityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tool" | "tools" => Ok(CapabilityCategory::Tool),
            "resource" | "resources" => Ok(CapabilityCategory::Resource),
            "prompt" | "prompts" => Ok(CapabilityCategory::Prompt),
            other => Err(format!("unknown capability category: {other}")),
        }
    }
}

/// Declared type of an argument. Values are coerced to this type during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ArgumentKind {
    /// JSON Schema `type` keyword, `None` for [`ArgumentKind::Any`].
    pub fn json_type(self) -> Option<&'static str> {
        match self {
            ArgumentKind::String => Some("string"),
            ArgumentKind::Integer => Some("integer"),
            ArgumentKind::Number => Some("number"),
            ArgumentKind::Boolean => Some("boolean"),
            ArgumentKind::Array => Some("array"),
            ArgumentKind::Object => Some("object"),
            ArgumentKind::Any => None,
        }
    }
}

/// One declared parameter of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: ArgumentKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ArgumentSpec {
    pub fn new(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ArgumentKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ArgumentKind::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ArgumentKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ArgumentKind::Boolean)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, ArgumentKind::Array)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ArgumentKind::Object)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Metadata for one registered capability.
///
/// `name` is the registry key: a tool or prompt name, or a resource URI
/// (which may be a URI template such as `file:///{path}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<ArgumentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            arguments: Vec::new(),
            mime_type: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_argument(mut self, argument: ArgumentSpec) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// True when the name contains `{var}` placeholders.
    pub fn is_template(&self) -> bool {
        self.name.contains('{') && self.name.contains('}')
    }

    /// Render the declared arguments as a JSON Schema object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for arg in &self.arguments {
            let mut prop = Map::new();
            if let Some(ty) = arg.kind.json_type() {
                prop.insert("type".into(), json!(ty));
            }
            if let Some(desc) = &arg.description {
                prop.insert("description".into(), json!(desc));
            }
            if let Some(default) = &arg.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(arg.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .arguments
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

/// A registry entry: descriptor plus the handler bound to it.
#[derive(Clone)]
pub struct Capability {
    descriptor: CapabilityDescriptor,
    handler: Arc<dyn Handler>,
}

impl Capability {
    pub fn new(descriptor: CapabilityDescriptor, handler: Arc<dyn Handler>) -> Self {
        Self {
            descriptor,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
