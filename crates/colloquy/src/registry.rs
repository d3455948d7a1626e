use serde::Serialize;
use strum_macros::Display;

use crate::errors::{AgentError, AgentResult};

pub const DEFAULT_CHAT_MODEL: &str = "us.anthropic.claude-3-5-sonnet-20241022-v2:0";
pub const DEFAULT_EMBEDDING_MODEL: &str = "amazon.titan-embed-text-v2:0";

// (name, description, token limit)
const CHAT_MODELS: &[(&str, &str, usize)] = &[
    ("gpt-4o-mini", "The GPT-4o Mini model.", 128_000),
    ("gpt-4o", "The GPT-4o model.", 128_000),
    ("o3-mini", "The O3 Mini model.", 200_000),
    ("o1", "The O1 model", 200_000),
    ("o1-mini", "The O1 Mini model.", 200_000),
    ("gpt-4.5-preview", "The GPT-4.5 Preview model.", 128_000),
    (
        "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
        "The Claude 3.7 Sonnet model.",
        200_000,
    ),
    (
        "us.anthropic.claude-3-5-sonnet-20241022-v2:0",
        "The Claude 3.5v2 Sonnet model.",
        200_000,
    ),
    (
        "anthropic.claude-3-sonnet-20240229-v1:0",
        "The Claude 3 Sonnet model.",
        28_000,
    ),
    (
        "anthropic.claude-3-haiku-20240307-v1:0",
        "The Claude 3 Haiku model.",
        48_000,
    ),
];

// (name, description, vector dimensions)
const EMBEDDING_MODELS: &[(&str, &str, usize)] = &[
    (
        "text-embedding-3-small",
        "The OpenAI Embedding 3 Small model.",
        1536,
    ),
    (
        "text-embedding-3-large",
        "The OpenAI Embedding 3 Large model.",
        3072,
    ),
    (
        "cohere.embed-english-v3",
        "The Embed English v3 model from Cohere.",
        1024,
    ),
    (
        "amazon.titan-embed-text-v2:0",
        "The Titan Embed Text v2 model from Amazon.",
        1024,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Embedding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCapacity {
    TokenLimit(usize),
    Dimensions(usize),
}

/// A known model and what it can hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub description: String,
    pub capacity: ModelCapacity,
}

impl ModelDescriptor {
    pub fn chat<N: Into<String>, D: Into<String>>(
        name: N,
        description: D,
        token_limit: usize,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capacity: ModelCapacity::TokenLimit(token_limit),
        }
    }

    pub fn embedding<N: Into<String>, D: Into<String>>(
        name: N,
        description: D,
        dimensions: usize,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capacity: ModelCapacity::Dimensions(dimensions),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self.capacity {
            ModelCapacity::TokenLimit(_) => ModelKind::Chat,
            ModelCapacity::Dimensions(_) => ModelKind::Embedding,
        }
    }

    pub fn token_limit(&self) -> Option<usize> {
        match self.capacity {
            ModelCapacity::TokenLimit(limit) => Some(limit),
            ModelCapacity::Dimensions(_) => None,
        }
    }

    pub fn dimensions(&self) -> Option<usize> {
        match self.capacity {
            ModelCapacity::Dimensions(dimensions) => Some(dimensions),
            ModelCapacity::TokenLimit(_) => None,
        }
    }
}

/// Read-only catalog of the chat and embedding models the engine accepts
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    /// The catalog of models reachable through the default gateway
    pub fn builtin() -> Self {
        let chat = CHAT_MODELS
            .iter()
            .map(|(name, description, limit)| ModelDescriptor::chat(*name, *description, *limit));
        let embedding = EMBEDDING_MODELS.iter().map(|(name, description, dimensions)| {
            ModelDescriptor::embedding(*name, *description, *dimensions)
        });
        Self::new(chat.chain(embedding).collect())
    }

    pub fn models(&self, kind: ModelKind) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter().filter(move |model| model.kind() == kind)
    }

    /// Find a model of the given kind, listing the valid names if it is unknown
    pub fn resolve(&self, name: &str, kind: ModelKind) -> AgentResult<&ModelDescriptor> {
        self.models(kind)
            .find(|model| model.name == name)
            .ok_or_else(|| AgentError::UnknownModel {
                kind: kind.to_string(),
                name: name.to_string(),
                valid: self.models(kind).map(|model| model.name.clone()).collect(),
            })
    }

    pub fn token_limit(&self, name: &str) -> AgentResult<usize> {
        let model = self.resolve(name, ModelKind::Chat)?;
        model
            .token_limit()
            .ok_or_else(|| AgentError::Internal(format!("{} has no token limit", name)))
    }

    pub fn embedding_dimension(&self, name: &str) -> AgentResult<usize> {
        let model = self.resolve(name, ModelKind::Embedding)?;
        model
            .dimensions()
            .ok_or_else(|| AgentError::Internal(format!("{} has no dimensions", name)))
    }

    /// Check the embedding model against the dimensionality the vector index was built with
    pub fn expect_embedding_dimension(&self, name: &str, expected: usize) -> AgentResult<usize> {
        let dimensions = self.embedding_dimension(name)?;
        if dimensions != expected {
            return Err(AgentError::Configuration(format!(
                "Embedding model {} produces {} dimensions, expected {} for the KNN index",
                name, dimensions, expected
            )));
        }
        Ok(dimensions)
    }
}
