use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use colloquy::{
    agent::AgentConfig,
    buffer::TrimStrategy,
    prompts::{RemotePromptConfig, DEFAULT_PROMPT_CACHE_TTL_SECS, DEFAULT_PROMPT_TIMEOUT_SECS},
    providers::{
        configs::{OpenAiProviderConfig, ProviderConfig},
        factory::ProviderType,
    },
    registry::DEFAULT_CHAT_MODEL,
};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default)]
        guardrail_id: Option<String>,
    },
}

impl ProviderSettings {
    #[allow(dead_code)]
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
        }
    }

    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                timeout_secs,
                guardrail_id,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                timeout_secs,
                guardrail_id,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_knn_embedding_dimension")]
    pub knn_embedding_dimension: usize,
    #[serde(default)]
    pub trim_strategy: TrimStrategy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            knn_embedding_dimension: default_knn_embedding_dimension(),
            trim_strategy: TrimStrategy::default(),
        }
    }
}

impl EngineSettings {
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_dimension: self.knn_embedding_dimension,
            trim_strategy: self.trim_strategy,
        }
    }
}

/// Prompt service credentials; remote prompts are used only when host and both keys are set
#[derive(Debug, Deserialize)]
pub struct PromptSettings {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_prompt_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_prompt_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            host: None,
            public_key: None,
            secret_key: None,
            timeout_secs: default_prompt_timeout_secs(),
            cache_ttl_secs: default_prompt_cache_ttl_secs(),
        }
    }
}

impl PromptSettings {
    pub fn remote(&self) -> Option<RemotePromptConfig> {
        match (&self.host, &self.public_key, &self.secret_key) {
            (Some(host), Some(public_key), Some(secret_key)) => Some(RemotePromptConfig {
                timeout_secs: self.timeout_secs,
                cache_ttl_secs: self.cache_ttl_secs,
                ..RemotePromptConfig::new(host, public_key, secret_key)
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ContextSettings {
    /// Fixed snippets added to every system prompt, `;` separated in the environment
    #[serde(default)]
    pub snippets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub prompts: PromptSettings,
    #[serde(default)]
    pub context: ContextSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.type", "openai")?
            .set_default("provider.host", default_openai_host())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(";")
                    .with_list_parse_key("context.snippets")
                    .try_parsing(true),
            )
            .build()?;

        // Try to deserialize the configuration
        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Handle missing field errors specially
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if let Some(field) = missing_field(&error_str) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field_path(field)),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

// Extract the field name from an error like "missing field `api_key`"
fn missing_field(error: &str) -> Option<&str> {
    let start = error.find("missing field `")? + "missing field `".len();
    let rest = &error[start..];
    rest.find('`').map(|end| &rest[..end])
}

// Serde reports the bare field name; the only required fields live under `provider`
fn field_path(field: &str) -> String {
    match field {
        "api_key" | "type" => format!("provider.{}", field),
        other => other.to_string(),
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_prompt_timeout_secs() -> u64 {
    DEFAULT_PROMPT_TIMEOUT_SECS
}

fn default_prompt_cache_ttl_secs() -> u64 {
    DEFAULT_PROMPT_CACHE_TTL_SECS
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_knn_embedding_dimension() -> usize {
    1536
}
