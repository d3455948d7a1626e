//! Where system prompts come from.
//!
//! A prompt is resolved by name with a set of parameters. Deployments either render the
//! templates compiled into the crate, or fetch managed prompts from a prompt service and
//! fall back to the compiled templates when that service is unavailable.
mod local;
mod remote;

pub use local::LocalPrompts;
pub use remote::{
    RemotePromptConfig, RemotePrompts, DEFAULT_PROMPT_CACHE_TTL_SECS, DEFAULT_PROMPT_TIMEOUT_SECS,
};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::errors::AgentResult;

/// Name of the system prompt used for chat turns
pub const CHAT_PROMPT: &str = "chat_prompt";

#[async_trait]
pub trait PromptSource: Send + Sync {
    /// Render the named prompt with the given parameters (a json object)
    async fn resolve(&self, name: &str, params: &Value) -> AgentResult<String>;
}

/// Pick the prompt source for this deployment: remote when configured, local otherwise
pub fn prompt_source(remote: Option<RemotePromptConfig>) -> AgentResult<Arc<dyn PromptSource>> {
    let local = LocalPrompts::builtin();
    match remote {
        Some(config) => Ok(Arc::new(RemotePrompts::new(config, local)?)),
        None => Ok(Arc::new(local)),
    }
}
