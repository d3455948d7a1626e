use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use colloquy::agent::{Agent, AgentConfig};
use colloquy::buffer::TrimStrategy;
use colloquy::errors::{AgentError, AgentResult};
use colloquy::models::message::Message;
use colloquy::models::role::Role;
use colloquy::models::tool::{Tool, ToolCallRequest};
use colloquy::prompts::{LocalPrompts, CHAT_PROMPT};
use colloquy::providers::base::{ChatRequest, ChatResponse, Provider, ProviderError};
use colloquy::registry::{ModelDescriptor, ModelRegistry};
use colloquy::tools::{Table, ToolHandler, ToolOutput, ToolRegistry};

/// Replays scripted responses and records what it was asked
#[derive(Default)]
struct ScriptedProvider {
    script: Mutex<Vec<ChatResponse>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(script: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(script),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.seen.lock().unwrap().push(request);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(ProviderError::Call("script exhausted".into()));
        }
        Ok(script.remove(0))
    }

    async fn embed(&self, _model: &str, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(Vec::new())
    }
}

#[derive(Serialize)]
struct SqlAnswer {
    sql: String,
    explanation: String,
}

/// A tool with its own state, answering questions with canned SQL
struct TextToSql {
    tool: Tool,
}

impl TextToSql {
    fn new() -> Self {
        Self {
            tool: Tool::new(
                "text_to_sql",
                "Translate a question into SQL",
                json!({
                    "type": "object",
                    "properties": {"question": {"type": "string"}},
                    "required": ["question"]
                }),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for TextToSql {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<ToolOutput> {
        let question = arguments
            .get("question")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::InvalidParameters("question parameter required".into()))?;
        ToolOutput::structured(&SqlAnswer {
            sql: "SELECT SUM(amount) FROM sales".to_string(),
            explanation: format!("Answers: {}", question),
        })
    }
}

/// Returns query rows as a table
struct RunQuery {
    tool: Tool,
}

#[async_trait]
impl ToolHandler for RunQuery {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, _arguments: Value) -> AgentResult<ToolOutput> {
        Ok(Table::new(["region", "total"])
            .with_row(vec![json!("north"), json!(10)])
            .with_row(vec![json!("south"), json!(7)])
            .into())
    }
}

fn tools() -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new()
        .with_tool(TextToSql::new())
        .unwrap()
        .with_tool(RunQuery {
            tool: Tool::new("run_query", "Run a SQL query", json!({"type": "object"})),
        })
        .unwrap();
    Arc::new(registry)
}

fn build_agent(
    provider: Arc<ScriptedProvider>,
    registry: ModelRegistry,
    chat_model: &str,
) -> Agent {
    let config = AgentConfig {
        chat_model: chat_model.to_string(),
        embedding_model: "text-embedding-3-small".to_string(),
        embedding_dimension: 1536,
        trim_strategy: TrimStrategy::ToolPairs,
    };
    Agent::new(provider, Arc::new(registry), config)
        .unwrap()
        .with_tools(tools())
        .with_prompts(Arc::new(
            LocalPrompts::new().with_template(CHAT_PROMPT, "You write SQL."),
        ))
}

#[tokio::test]
async fn test_tool_round_then_final_answer() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::new(vec![
        ChatResponse::tool_calls(vec![
            ToolCallRequest::new("c1", "text_to_sql", r#"{"question":"total sales?"}"#),
            ToolCallRequest::new("c2", "run_query", "{}"),
        ]),
        ChatResponse::text("North sold 10, south sold 7."),
    ]));
    let agent = build_agent(provider.clone(), ModelRegistry::builtin(), "gpt-4o");

    let first = agent
        .reply(vec![Message::user().with_text("total sales?")])
        .await?;
    assert_eq!(first.len(), 4);
    assert_eq!(
        serde_json::from_str::<Value>(&first[2].content)?,
        json!({"sql": "SELECT SUM(amount) FROM sales", "explanation": "Answers: total sales?"})
    );
    assert_eq!(
        serde_json::from_str::<Value>(&first[3].content)?,
        json!({"columns": ["region", "total"], "rows": [["north", 10], ["south", 7]]})
    );

    // the caller sends the whole history back through the wire format
    let wire = serde_json::to_string(&first)?;
    let history: Vec<Message> = serde_json::from_str(&wire)?;
    assert_eq!(history, first);

    let second = agent.reply(history).await?;
    assert_eq!(second.len(), 5);
    assert_eq!(second[4].role, Role::Assistant);
    assert_eq!(second[4].content, "North sold 10, south sold 7.");

    let seen = provider.seen();
    assert_eq!(seen.len(), 2);
    let replayed: Vec<Role> = seen[1].messages.iter().map(|m| m.role).collect();
    assert_eq!(
        replayed,
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Tool]
    );
    assert_eq!(seen[1].messages[2].tool_calls.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_history_is_trimmed_for_the_model_only() -> Result<()> {
    let registry = ModelRegistry::new(vec![
        ModelDescriptor::chat("tiny", "A model with a tiny window.", 10),
        ModelDescriptor::embedding("text-embedding-3-small", "Embeddings.", 1536),
    ]);
    let provider = Arc::new(ScriptedProvider::new(vec![ChatResponse::text("ok")]));
    let agent = build_agent(provider.clone(), registry, "tiny");

    let history: Vec<Message> = (0..10)
        .map(|i| Message::user().with_text(format!("message number {}", i)))
        .collect();
    let result = agent.reply(history.clone()).await?;

    assert_eq!(result.len(), 11);
    assert_eq!(&result[..10], &history[..]);

    let sent = &provider.seen()[0].messages;
    assert!(sent.len() < 11);
    assert_eq!(sent.last().map(|m| m.content.as_str()), Some("message number 9"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_model_lists_valid_names() {
    let provider = Arc::new(ScriptedProvider::default());
    let config = AgentConfig {
        chat_model: "gpt-1".to_string(),
        ..AgentConfig::default()
    };
    let err = Agent::new(provider, Arc::new(ModelRegistry::builtin()), config)
        .err()
        .unwrap();
    let message = err.to_string();
    assert!(message.starts_with("Invalid chat model: gpt-1"));
    assert!(message.contains("o3-mini"));
    assert!(message.contains("anthropic.claude-3-haiku-20240307-v1:0"));
}
