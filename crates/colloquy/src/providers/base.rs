use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCallRequest};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Failures at the provider boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The provider rejected the request itself; the message is safe to show the caller
    #[error("{0}")]
    BadRequest(String),

    #[error("Provider call failed: {0}")]
    Call(String),
}

/// Everything the provider needs for one chat completion
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    /// System prompt first, then the trimmed history
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReason {
    Stop,
    ToolCalls,
    Other(String),
}

impl From<&str> for CompletionReason {
    fn from(reason: &str) -> Self {
        match reason {
            "stop" => CompletionReason::Stop,
            "tool_calls" => CompletionReason::ToolCalls,
            other => CompletionReason::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub completion_reason: CompletionReason,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Usage,
}

impl ChatResponse {
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            completion_reason: CompletionReason::Stop,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            usage: Usage::default(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            completion_reason: CompletionReason::ToolCalls,
            content: None,
            tool_calls,
            usage: Usage::default(),
        }
    }
}

/// Base trait for model providers (OpenAI compatible gateways, test doubles)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next assistant turn for the request
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Embed a piece of text with the given embedding model
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(20));
        assert_eq!(usage.total_tokens, Some(30));
    }

    #[test]
    fn test_usage_serialization() -> Result<()> {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage)?;
        let deserialized: Usage = serde_json::from_str(&serialized)?;
        assert_eq!(usage, deserialized);

        let json_value: serde_json::Value = serde_json::from_str(&serialized)?;
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["output_tokens"], json!(20));
        assert_eq!(json_value["total_tokens"], json!(30));

        Ok(())
    }

    #[test]
    fn test_completion_reason_from_str() {
        assert_eq!(CompletionReason::from("stop"), CompletionReason::Stop);
        assert_eq!(
            CompletionReason::from("tool_calls"),
            CompletionReason::ToolCalls
        );
        assert_eq!(
            CompletionReason::from("length"),
            CompletionReason::Other("length".to_string())
        );
    }
}
