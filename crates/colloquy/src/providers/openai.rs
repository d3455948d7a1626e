use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{ChatRequest, ChatResponse, Provider, ProviderError};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_bedrock_context_length_error, check_openai_context_length_error,
    messages_to_openai_spec, openai_response_to_chat_response, openai_response_to_embedding,
    tools_to_openai_spec,
};

/// Provider for OpenAI and OpenAI compatible gateways
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, endpoint: &str, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/{}",
            self.config.host.trim_end_matches('/'),
            endpoint
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Call(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| ProviderError::Call(format!("Invalid response body: {}", e))),
            status
                if status == StatusCode::BAD_REQUEST
                    || status == StatusCode::UNPROCESSABLE_ENTITY =>
            {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                Err(ProviderError::BadRequest(bad_request_message(status, &body)))
            }
            status => Err(ProviderError::Call(format!("Server error: {}", status))),
        }
    }
}

/// The most specific description of a rejected request the body offers
fn bad_request_message(status: StatusCode, body: &Value) -> String {
    let error = body.get("error").unwrap_or(body);
    if let Some(err) = check_openai_context_length_error(error)
        .or_else(|| check_bedrock_context_length_error(error))
    {
        return err.to_string();
    }

    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed: {}", status))
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let tools_spec =
            tools_to_openai_spec(&request.tools).map_err(|e| ProviderError::Call(e.to_string()))?;

        let mut payload = json!({
            "model": request.model,
            "messages": messages_to_openai_spec(&request.messages),
        });

        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if !request.metadata.is_empty() {
            payload["metadata"] = json!(request.metadata);
        }
        if let Some(guardrail_id) = &self.config.guardrail_id {
            payload["guardrailConfig"] = json!({
                "guardrailIdentifier": guardrail_id,
                "guardrailVersion": "DRAFT",
                "trace": "enabled",
            });
        }

        let response = self.post("chat/completions", payload).await?;
        tracing::debug!(response = %response, "chat response");

        openai_response_to_chat_response(&response).map_err(|e| ProviderError::Call(e.to_string()))
    }

    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let payload = json!({
            "model": model,
            "input": text,
        });

        let response = self.post("embeddings", payload).await?;
        openai_response_to_embedding(&response).map_err(|e| ProviderError::Call(e.to_string()))
    }
}
