use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use strum_macros::Display;
use tracing::Instrument;
use uuid::Uuid;

use crate::buffer::{ConversationBuffer, TrimStrategy};
use crate::context::{lookup_or_empty, ContextSource};
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::ToolCallRequest;
use crate::prompts::{LocalPrompts, PromptSource, CHAT_PROMPT};
use crate::providers::base::{ChatRequest, ChatResponse, CompletionReason, Provider, ProviderError};
use crate::registry::{ModelRegistry, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};
use crate::token_counter::TokenCounter;
use crate::tools::ToolRegistry;

/// Which models a session uses and how it trims history
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub chat_model: String,
    pub embedding_model: String,
    /// Dimensionality the vector index expects from the embedding model
    pub embedding_dimension: usize,
    pub trim_strategy: TrimStrategy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: 1024,
            trim_strategy: TrimStrategy::default(),
        }
    }
}

/// Phases of a single chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    Preparing,
    AwaitingModel,
    Final,
    DispatchingTools,
    Assembled,
}

/// Agent integrates a chat model with the tools it may call during a turn
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: Arc<ModelRegistry>,
    tools: Arc<ToolRegistry>,
    prompts: Arc<dyn PromptSource>,
    context: Option<Arc<dyn ContextSource>>,
    buffer: ConversationBuffer,
    chat_model: String,
    token_limit: usize,
    embedding_model: String,
    embedding_dimension: usize,
}

impl Agent {
    /// Create an agent, validating the configured models against the registry
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ModelRegistry>,
        config: AgentConfig,
    ) -> AgentResult<Self> {
        let token_limit = registry.token_limit(&config.chat_model)?;
        let embedding_dimension = registry
            .expect_embedding_dimension(&config.embedding_model, config.embedding_dimension)?;
        let buffer = ConversationBuffer::new(TokenCounter::new()?, config.trim_strategy);

        tracing::info!(
            chat_model = %config.chat_model,
            token_limit,
            embedding_model = %config.embedding_model,
            trim_strategy = %config.trim_strategy,
            "agent configured"
        );

        Ok(Self {
            provider,
            registry,
            tools: Arc::new(ToolRegistry::new()),
            prompts: Arc::new(LocalPrompts::builtin()),
            context: None,
            buffer,
            chat_model: config.chat_model,
            token_limit,
            embedding_model: config.embedding_model,
            embedding_dimension,
        })
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_prompts(mut self, prompts: Arc<dyn PromptSource>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_context(mut self, context: Arc<dyn ContextSource>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Run one chat turn.
    ///
    /// Returns the caller's history followed by the assistant message and, when the model
    /// asked for tools, one tool message per call in the order the model listed them.
    pub async fn reply(&self, messages: Vec<Message>) -> AgentResult<Vec<Message>> {
        if messages.is_empty() {
            return Err(AgentError::Validation(
                "Chat messages are required.".to_string(),
            ));
        }

        let turn_id = Uuid::new_v4().to_string();
        let span = tracing::debug_span!("turn", turn_id = %turn_id);
        self.run_turn(messages, turn_id).instrument(span).await
    }

    async fn run_turn(&self, messages: Vec<Message>, turn_id: String) -> AgentResult<Vec<Message>> {
        tracing::debug!(state = %TurnState::Preparing, messages = messages.len());
        let request = self.prepare(&messages, &turn_id).await?;

        tracing::debug!(state = %TurnState::AwaitingModel, model = %self.chat_model);
        let response = self.provider.chat(request).await.map_err(|e| {
            tracing::error!("Failed to fetch chat response: {}", e);
            map_provider_error(e)
        })?;
        tracing::debug!(
            reason = ?response.completion_reason,
            tool_calls = response.tool_calls.len(),
            "model responded"
        );

        let mut history = messages;
        history.extend(self.interpret(response).await);
        tracing::debug!(state = %TurnState::Assembled, messages = history.len());

        Ok(history)
    }

    /// Generate an embedding with the configured embedding model.
    ///
    /// An empty result from the provider becomes a zero vector of the configured dimensionality.
    pub async fn embed(&self, text: &str) -> AgentResult<Vec<f32>> {
        let embedding = self
            .provider
            .embed(&self.embedding_model, text)
            .await
            .map_err(|e| {
                tracing::error!("Error generating embeddings: {}", e);
                AgentError::ProviderCall("Error generating embeddings.".to_string())
            })?;

        if embedding.is_empty() {
            return Ok(vec![0.0; self.embedding_dimension]);
        }
        Ok(embedding)
    }

    async fn prepare(&self, messages: &[Message], turn_id: &str) -> AgentResult<ChatRequest> {
        let query = messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        let snippets = lookup_or_empty(self.context.as_deref(), query).await;

        let system_prompt = self
            .prompts
            .resolve(CHAT_PROMPT, &json!({ "schema_context": snippets }))
            .await?;

        let mut request_messages = vec![Message::system().with_text(system_prompt).unstamped()];
        request_messages.extend(self.buffer.trim(messages, self.token_limit));

        let mut metadata = HashMap::new();
        metadata.insert("turn_id".to_string(), turn_id.to_string());

        Ok(ChatRequest {
            model: self.chat_model.clone(),
            messages: request_messages,
            tools: self.tools.schemas(),
            metadata,
        })
    }

    /// Turn the model's response into the messages appended to the history
    async fn interpret(&self, response: ChatResponse) -> Vec<Message> {
        let content = response.content.unwrap_or_default();

        if response.completion_reason != CompletionReason::ToolCalls
            || response.tool_calls.is_empty()
        {
            tracing::debug!(state = %TurnState::Final);
            return vec![Message::assistant().with_text(content)];
        }

        tracing::debug!(state = %TurnState::DispatchingTools);
        let mut appended = Vec::with_capacity(response.tool_calls.len() + 1);
        appended.push(
            Message::assistant()
                .with_text(content)
                .with_tool_calls(response.tool_calls.clone()),
        );
        for call in &response.tool_calls {
            appended.push(self.dispatch_tool_call(call).await);
        }
        appended
    }

    /// Run a single tool call, turning any failure into an error payload for the model
    async fn dispatch_tool_call(&self, call: &ToolCallRequest) -> Message {
        let content = match self.tools.execute(&call.function_name, &call.arguments).await {
            Ok(result) => result.to_string(),
            Err(e) => {
                tracing::warn!(
                    tool = %call.function_name,
                    call_id = %call.id,
                    "Tool call failed: {}",
                    e
                );
                json!({ "error": e.to_string() }).to_string()
            }
        };
        Message::tool(&call.id).with_text(content)
    }
}

fn map_provider_error(error: ProviderError) -> AgentError {
    match error {
        ProviderError::BadRequest(message) => AgentError::ProviderRequest(message),
        ProviderError::Call(_) => {
            AgentError::ProviderCall("Error in fetching chat response.".to_string())
        }
    }
}
