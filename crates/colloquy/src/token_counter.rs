use tiktoken_rs::{p50k_base, CoreBPE};

use crate::errors::{AgentError, AgentResult};

/// Deterministic text to token mapping, used for budget accounting only.
///
/// Special token markers in the text are encoded as ordinary text, so any string is
/// tokenizable.
pub struct TokenCounter {
    bpe: CoreBPE,
}

impl TokenCounter {
    pub fn new() -> AgentResult<Self> {
        let bpe = p50k_base()
            .map_err(|e| AgentError::Configuration(format!("Failed to load tokenizer: {}", e)))?;
        Ok(TokenCounter { bpe })
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }

    /// Rebuild text from its own token sequence.
    pub fn rebuild(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let tokens = self.bpe.encode_ordinary(text);
        match self.bpe.decode(tokens) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!("Failed to decode token sequence: {}", e);
                text.to_string()
            }
        }
    }

    /// Ensure text is non-empty and fits within `token_limit`
    pub fn validate_token_length(&self, text: &str, token_limit: usize) -> AgentResult<()> {
        if text.is_empty() {
            return Err(AgentError::Validation(
                "Text must be a non-empty string.".to_string(),
            ));
        }
        if self.count_tokens(text) > token_limit {
            return Err(AgentError::Validation(format!(
                "Text exceeds max token length of {}.",
                token_limit
            )));
        }
        Ok(())
    }
}
