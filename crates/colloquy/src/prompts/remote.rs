use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::{Captures, Regex};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{LocalPrompts, PromptSource};
use crate::errors::{AgentError, AgentResult};

pub const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PROMPT_CACHE_TTL_SECS: u64 = 60;

/// Connection details for a Langfuse compatible prompt management service
#[derive(Debug, Clone)]
pub struct RemotePromptConfig {
    pub host: String,
    pub public_key: String,
    pub secret_key: String,
    pub timeout_secs: u64,
    /// How long a fetched prompt is served before the service is asked again
    pub cache_ttl_secs: u64,
}

impl RemotePromptConfig {
    pub fn new<H, P, S>(host: H, public_key: P, secret_key: S) -> Self
    where
        H: Into<String>,
        P: Into<String>,
        S: Into<String>,
    {
        Self {
            host: host.into(),
            public_key: public_key.into(),
            secret_key: secret_key.into(),
            timeout_secs: DEFAULT_PROMPT_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_PROMPT_CACHE_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PromptMessage {
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PromptBody {
    Chat(Vec<PromptMessage>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct ManagedPrompt {
    prompt: PromptBody,
}

struct CachedPrompt {
    body: PromptBody,
    fetched_at: Instant,
}

/// Prompts fetched from a prompt service.
///
/// Each prompt is cached by name. A fresh copy is served without a request. When a refresh
/// fails the last good copy is served, and local templates are used only when the service
/// has never answered for that name.
pub struct RemotePrompts {
    client: Client,
    config: RemotePromptConfig,
    fallback: LocalPrompts,
    cache: RwLock<HashMap<String, CachedPrompt>>,
}

impl RemotePrompts {
    pub fn new(config: RemotePromptConfig, fallback: LocalPrompts) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            config,
            fallback,
            cache: RwLock::new(HashMap::new()),
        })
    }

    async fn fetch(&self, name: &str) -> Result<ManagedPrompt> {
        let url = format!(
            "{}/api/public/v2/prompts/{}",
            self.config.host.trim_end_matches('/'),
            name
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.public_key, Some(&self.config.secret_key))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status => Err(anyhow!("Prompt service returned {} for {}", status, name)),
        }
    }

    /// The cached body for `name`, along with whether it is still within its ttl
    async fn cached(&self, name: &str) -> Option<(PromptBody, bool)> {
        let ttl = Duration::from_secs(self.config.cache_ttl_secs);
        self.cache.read().await.get(name).map(|cached| {
            (cached.body.clone(), cached.fetched_at.elapsed() < ttl)
        })
    }
}

#[async_trait]
impl PromptSource for RemotePrompts {
    async fn resolve(&self, name: &str, params: &Value) -> AgentResult<String> {
        let cached = self.cached(name).await;
        if let Some((body, true)) = &cached {
            return Ok(compile(body, params));
        }

        match self.fetch(name).await {
            Ok(managed) => {
                let prompt = compile(&managed.prompt, params);
                self.cache.write().await.insert(
                    name.to_string(),
                    CachedPrompt {
                        body: managed.prompt,
                        fetched_at: Instant::now(),
                    },
                );
                Ok(prompt)
            }
            Err(e) => match cached {
                Some((body, _)) => {
                    tracing::warn!("Serving cached prompt {} after refresh failed: {}", name, e);
                    Ok(compile(&body, params))
                }
                None => {
                    tracing::warn!("Falling back to local prompt {}: {}", name, e);
                    self.fallback.resolve(name, params).await
                }
            },
        }
    }
}

/// Render a managed prompt as system prompt text.
///
/// Chat prompts are joined message by message; their roles are not kept, so any user or
/// assistant turns in a managed chat prompt are flattened into the system text.
fn compile(body: &PromptBody, params: &Value) -> String {
    match body {
        PromptBody::Text(text) => compile_variables(text, params),
        PromptBody::Chat(messages) => messages
            .iter()
            .map(|message| compile_variables(&message.content, params))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// Substitute `{{name}}` placeholders; unknown placeholders are left as written
fn compile_variables(template: &str, params: &Value) -> String {
    let re = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap();
    re.replace_all(template, |caps: &Captures| match params.get(&caps[1]) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
        None => caps[0].to_string(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::CHAT_PROMPT;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROMPT_PATH: &str = "/api/public/v2/prompts/chat_prompt";

    fn remote_prompts(
        server: &MockServer,
        configure: impl FnOnce(&mut RemotePromptConfig),
    ) -> RemotePrompts {
        let mut config = RemotePromptConfig::new(server.uri(), "pk-test", "sk-test");
        configure(&mut config);
        RemotePrompts::new(
            config,
            LocalPrompts::new().with_template(CHAT_PROMPT, "local prompt"),
        )
        .unwrap()
    }

    async fn setup(status: u16, body: Value) -> (MockServer, RemotePrompts) {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROMPT_PATH))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&mock_server)
            .await;

        let prompts = remote_prompts(&mock_server, |_| {});
        (mock_server, prompts)
    }

    fn text_prompt(text: &str) -> Value {
        json!({"name": "chat_prompt", "type": "text", "prompt": text})
    }

    #[tokio::test]
    async fn test_chat_prompt_is_compiled() {
        let (_server, prompts) = setup(
            200,
            json!({
                "name": "chat_prompt",
                "version": 3,
                "type": "chat",
                "prompt": [
                    {"role": "system", "content": "You answer questions about {{ domain }}."},
                    {"role": "system", "content": "Schema:\n{{schema_context}}"}
                ]
            }),
        )
        .await;

        let prompt = prompts
            .resolve(
                CHAT_PROMPT,
                &json!({"domain": "sales", "schema_context": ["Table a", "Table b"]}),
            )
            .await
            .unwrap();
        assert_eq!(
            prompt,
            "You answer questions about sales.\n\nSchema:\nTable a\nTable b"
        );
    }

    #[tokio::test]
    async fn test_text_prompt_keeps_unknown_placeholders() {
        let (_server, prompts) = setup(200, text_prompt("Hi {{user}}, {{ n }}")).await;

        let prompt = prompts
            .resolve(CHAT_PROMPT, &json!({"n": 2}))
            .await
            .unwrap();
        assert_eq!(prompt, "Hi {{user}}, 2");
    }

    #[tokio::test]
    async fn test_falls_back_to_local_on_error() {
        let (_server, prompts) = setup(500, json!({"message": "down"})).await;
        let prompt = prompts.resolve(CHAT_PROMPT, &json!({})).await.unwrap();
        assert_eq!(prompt, "local prompt");
    }

    #[tokio::test]
    async fn test_falls_back_on_unparseable_body() {
        let (_server, prompts) = setup(200, json!({})).await;
        let prompt = prompts.resolve(CHAT_PROMPT, &json!({})).await.unwrap();
        assert_eq!(prompt, "local prompt");
    }

    #[tokio::test]
    async fn test_fresh_prompt_is_served_from_cache() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROMPT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_prompt(
                "Schema:\n{{schema_context}}",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;
        let prompts = remote_prompts(&mock_server, |_| {});

        let first = prompts
            .resolve(CHAT_PROMPT, &json!({"schema_context": ["Table sales: Columns are Amount."]}))
            .await
            .unwrap();
        let second = prompts
            .resolve(CHAT_PROMPT, &json!({"schema_context": ["Table time: Columns are Month."]}))
            .await
            .unwrap();

        assert_eq!(first, "Schema:\nTable sales: Columns are Amount.");
        assert_eq!(second, "Schema:\nTable time: Columns are Month.");
    }

    #[tokio::test]
    async fn test_stale_prompt_is_served_when_refresh_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROMPT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_prompt("managed prompt")))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROMPT_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;
        let prompts = remote_prompts(&mock_server, |config| config.cache_ttl_secs = 0);

        let first = prompts.resolve(CHAT_PROMPT, &json!({})).await.unwrap();
        let second = prompts.resolve(CHAT_PROMPT, &json!({})).await.unwrap();
        assert_eq!(first, "managed prompt");
        assert_eq!(second, "managed prompt");
    }

    #[tokio::test]
    async fn test_slow_service_times_out_to_local() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROMPT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_prompt("managed prompt"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;
        let prompts = remote_prompts(&mock_server, |config| config.timeout_secs = 1);

        let started = Instant::now();
        let prompt = prompts.resolve(CHAT_PROMPT, &json!({})).await.unwrap();
        assert_eq!(prompt, "local prompt");
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
