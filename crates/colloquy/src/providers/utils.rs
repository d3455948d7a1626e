use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Value};

use super::base::{ChatResponse, CompletionReason, Usage};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCallRequest};

/// Convert internal Message format to OpenAI's API message specification.
///
/// Only the fields a provider reads are emitted; ids and timestamps stay local.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = json!({
            "role": message.role
        });

        // An assistant turn that only requests tools carries no content
        if !(message.role == Role::Assistant
            && message.has_tool_calls()
            && message.content.is_empty())
        {
            converted["content"] = json!(message.content);
        }

        if message.has_tool_calls() {
            let tool_calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": sanitize_function_name(&call.function_name),
                            "arguments": call.arguments,
                        }
                    })
                })
                .collect();
            converted["tool_calls"] = json!(tool_calls);
        }

        if let Some(tool_call_id) = &message.tool_call_id {
            converted["tool_call_id"] = json!(tool_call_id);
        }

        messages_spec.push(converted);
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's chat completion response to a ChatResponse
///
/// Tool call arguments are kept as the encoded text the model produced; decoding them is
/// the dispatcher's job.
pub fn openai_response_to_chat_response(response: &Value) -> Result<ChatResponse> {
    let choice = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .ok_or_else(|| anyhow!("No choices in response"))?;
    let original = &choice["message"];

    let content = original
        .get("content")
        .and_then(|text| text.as_str())
        .map(str::to_string);

    let mut tool_calls = Vec::new();
    if let Some(tool_calls_array) = original.get("tool_calls").and_then(|v| v.as_array()) {
        for tool_call in tool_calls_array {
            let id = tool_call["id"]
                .as_str()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| anyhow!("Malformed tool call: missing id in {}", tool_call))?;
            let function_name = tool_call["function"]["name"]
                .as_str()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| anyhow!("Malformed tool call: missing name in {}", tool_call))?;
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();
            tool_calls.push(ToolCallRequest::new(id, function_name, arguments));
        }
    }

    let completion_reason = match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some(reason) => CompletionReason::from(reason),
        None if !tool_calls.is_empty() => CompletionReason::ToolCalls,
        None => CompletionReason::Stop,
    };

    Ok(ChatResponse {
        completion_reason,
        content,
        tool_calls,
        usage: get_usage(response),
    })
}

/// Token usage reported by an OpenAI compatible response, when present
pub fn get_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Extract the first embedding vector from an embeddings response.
///
/// A response without data yields an empty vector.
pub fn openai_response_to_embedding(response: &Value) -> Result<Vec<f32>> {
    let Some(first) = response
        .get("data")
        .and_then(|data| data.as_array())
        .and_then(|data| data.first())
    else {
        return Ok(Vec::new());
    };

    first
        .get("embedding")
        .and_then(|embedding| embedding.as_array())
        .ok_or_else(|| anyhow!("Embedding missing from response"))?
        .iter()
        .map(|value| {
            value
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| anyhow!("Embedding contains a non-numeric value: {}", value))
        })
        .collect()
}

fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    re.replace_all(name, "_").to_string()
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}

pub fn check_bedrock_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let external_message = error.get("external_model_message")?.get("message")?.as_str()?;
    if external_message.to_lowercase().contains("too long") {
        Some(ContextLengthExceededError(external_message.to_string()))
    } else {
        None
    }
}
