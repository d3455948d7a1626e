use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use super::{PromptSource, CHAT_PROMPT};
use crate::errors::{AgentError, AgentResult};
use crate::prompt_template::{load_prompt, load_prompt_file};

#[derive(Debug, Clone)]
enum Template {
    Inline(String),
    File(PathBuf),
}

/// Prompts rendered from tera templates held locally
#[derive(Debug, Clone, Default)]
pub struct LocalPrompts {
    templates: HashMap<String, Template>,
}

impl LocalPrompts {
    pub fn new() -> Self {
        Self::default()
    }

    /// The templates compiled into the crate
    pub fn builtin() -> Self {
        Self::new().with_template(CHAT_PROMPT, include_str!("chat_prompt.md"))
    }

    pub fn with_template<N: Into<String>, T: Into<String>>(mut self, name: N, template: T) -> Self {
        self.templates
            .insert(name.into(), Template::Inline(template.into()));
        self
    }

    /// Register a template read from disk each time it is resolved
    pub fn with_template_file<N: Into<String>>(
        mut self,
        name: N,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.templates.insert(name.into(), Template::File(path.into()));
        self
    }
}

#[async_trait]
impl PromptSource for LocalPrompts {
    async fn resolve(&self, name: &str, params: &Value) -> AgentResult<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| AgentError::Internal(format!("Unknown prompt: {}", name)))?;

        let rendered = match template {
            Template::Inline(text) => load_prompt(text, params),
            Template::File(path) => load_prompt_file(path.clone(), params),
        };
        rendered.map_err(|e| {
            AgentError::Internal(format!("Failed to render prompt {}: {}", name, e))
        })
    }
}
