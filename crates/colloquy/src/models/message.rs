use super::role::Role;
use super::tool::ToolCallRequest;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current UTC time with nanosecond precision, e.g. `2025-03-01 09:15:02.123456789`
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.9f").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
///
/// Messages the engine creates always carry an `id` and `timestamp`. Messages supplied by a
/// caller may omit both and are passed through untouched.
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create an empty message with a fresh id and the current timestamp
    pub fn new(role: Role) -> Self {
        Message {
            id: Some(Uuid::new_v4().to_string()),
            role,
            content: String::new(),
            timestamp: Some(timestamp_now()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system() -> Self {
        Self::new(Role::System)
    }

    pub fn user() -> Self {
        Self::new(Role::User)
    }

    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a tool message answering the call with the given id
    pub fn tool<S: Into<String>>(tool_call_id: S) -> Self {
        let mut message = Self::new(Role::Tool);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Set the text content of the message
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = text.into();
        self
    }

    /// Add a tool call request to the message
    pub fn with_tool_call(mut self, tool_call: ToolCallRequest) -> Self {
        self.tool_calls.push(tool_call);
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallRequest>) -> Self {
        self.tool_calls.extend(tool_calls);
        self
    }

    /// Drop the identity fields, keeping only what a provider needs to see
    pub fn unstamped(mut self) -> Self {
        self.id = None;
        self.timestamp = None;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Whether this tool message answers one of the given calls
    pub fn answers(&self, calls: &[ToolCallRequest]) -> bool {
        match (&self.role, &self.tool_call_id) {
            (Role::Tool, Some(id)) => calls.iter().any(|call| &call.id == id),
            _ => false,
        }
    }
}
