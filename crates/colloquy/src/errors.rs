use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("{0}")]
    Validation(String),

    /// The provider rejected the request as malformed; the message is kept verbatim
    #[error("{0}")]
    ProviderRequest(String),

    #[error("Provider call failed: {0}")]
    ProviderCall(String),

    #[error("Invalid {kind} model: {name}. Must be one of {valid:?}")]
    UnknownModel {
        kind: String,
        name: String,
        valid: Vec<String>,
    },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether the caller can fix this by correcting their request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AgentError::Validation(_) | AgentError::ProviderRequest(_)
        )
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
