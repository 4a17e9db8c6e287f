//! Provider-agnostic prompt and tool-call types.
//!
//! The chat engine speaks to generative backends through these types only.
//! Backends translate them to their wire formats and translate tool calls
//! back without normalizing them; normalization happens in the chat crate.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// =============================================================================
// PROMPT MESSAGES
// =============================================================================

/// A single role-tagged message sent to a generative backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PromptMessage {
    System {
        content: String,
    },
    Human {
        content: String,
    },
    Assistant {
        content: String,
        /// Tool calls the model emitted in this message, echoed back verbatim.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<RawToolCall>,
    },
    Tool {
        name: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }
}

/// What the model is asked to continue: a flat prompt or a message list.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptInput {
    Prompt(String),
    Messages(Vec<PromptMessage>),
}

impl PromptInput {
    /// Total content length in bytes, for logging.
    pub fn len(&self) -> usize {
        match self {
            Self::Prompt(p) => p.len(),
            Self::Messages(msgs) => msgs.iter().map(|m| m.content().len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// TOOLS
// =============================================================================

/// A function tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments object.
    pub parameters: JsonValue,
}

/// Request passed to [`crate::ChatBackend::chat`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChatInvocation {
    pub input: PromptInput,
    pub tools: Vec<ToolDefinition>,
}

impl ChatInvocation {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            input: PromptInput::Prompt(prompt.into()),
            tools: Vec::new(),
        }
    }

    pub fn messages(messages: Vec<PromptMessage>) -> Self {
        Self {
            input: PromptInput::Messages(messages),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Model output: text plus any tool calls it requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub text: String,
    pub tool_calls: Vec<RawToolCall>,
}

impl ChatCompletion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<RawToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

// =============================================================================
// RAW TOOL CALLS
// =============================================================================

/// A tool call exactly as a backend reported it.
///
/// Providers disagree on the shape: some return loosely-typed mappings,
/// others typed objects with `function` sub-objects. Both are carried here
/// and interpreted later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawToolCall {
    /// Loosely-typed key/value payload.
    Mapping(JsonValue),
    /// Typed object with attribute access.
    Object(ToolCallObject),
}

impl RawToolCall {
    /// Provider-assigned call id, when one exists.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::Mapping(value) => value.get("id").and_then(JsonValue::as_str),
            Self::Object(obj) => obj.id.as_deref(),
        }
    }

    /// Call id, or a positional `call_{index}` placeholder when the provider
    /// did not assign one.
    pub fn resolved_call_id(&self, index: usize) -> String {
        self.call_id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("call_{}", index))
    }
}

impl std::fmt::Display for RawToolCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mapping(value) => write!(f, "{}", value),
            Self::Object(obj) => write!(f, "{}", obj),
        }
    }
}

/// Attribute-bearing tool call object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionPayload>,
}

impl std::fmt::Display for ToolCallObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ToolCallObject(")?;
        if let Some(id) = &self.id {
            write!(f, "id={}, ", id)?;
        }
        write!(f, "name={:?}", self.name.as_deref().unwrap_or(""))?;
        if let Some(args) = &self.args {
            write!(f, ", args={}", args)?;
        }
        if let Some(function) = &self.function {
            write!(f, ", function={}", function)?;
        }
        write!(f, ")")
    }
}

/// The `function` attribute of a tool call object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FunctionPayload {
    Mapping(JsonValue),
    Object(FunctionAttr),
}

impl std::fmt::Display for FunctionPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mapping(value) => write!(f, "{}", value),
            Self::Object(attr) => {
                write!(f, "Function(name={:?}", attr.name.as_deref().unwrap_or(""))?;
                if let Some(arguments) = &attr.arguments {
                    write!(f, ", arguments={}", arguments)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Typed `function` attribute: a name and arguments that may be a JSON
/// string or an already-decoded value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionAttr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<JsonValue>,
}
