mod function;
mod output;

pub use function::FunctionTool;
pub use output::{Table, ToolOutput};

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

/// A named, schema-described callable the model may ask the engine to invoke
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name, description and argument schema
    fn tool(&self) -> &Tool;

    /// Invoke the tool with decoded arguments
    async fn call(&self, arguments: Value) -> AgentResult<ToolOutput>;
}

/// Catalog of the tools available to a session.
///
/// Built once before the first turn and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique within the catalog
    pub fn add<H: ToolHandler + 'static>(&mut self, handler: H) -> AgentResult<()> {
        let name = &handler.tool().name;
        if self.get(name).is_some() {
            return Err(AgentError::Configuration(format!(
                "Duplicate tool name: {}",
                name
            )));
        }
        self.handlers.push(Arc::new(handler));
        Ok(())
    }

    pub fn with_tool<H: ToolHandler + 'static>(mut self, handler: H) -> AgentResult<Self> {
        self.add(handler)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Schemas for every registered tool, in registration order
    pub fn schemas(&self) -> Vec<Tool> {
        self.handlers
            .iter()
            .map(|handler| handler.tool().clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.tool().name == name)
            .map(|handler| &**handler)
    }

    /// Decode the model's arguments, run the named tool and normalize what it returns.
    ///
    /// Malformed arguments fail before any tool runs.
    pub async fn execute(&self, name: &str, argument_text: &str) -> AgentResult<Value> {
        let arguments: Value = serde_json::from_str(argument_text).map_err(|e| {
            AgentError::InvalidParameters(format!(
                "Could not interpret tool use parameters for {}: {}",
                name, e
            ))
        })?;
        if !arguments.is_object() {
            return Err(AgentError::InvalidParameters(format!(
                "Tool use parameters for {} must be an object, got {}",
                name, arguments
            )));
        }

        let handler = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        tracing::debug!(tool = name, "invoking tool");
        let output = AssertUnwindSafe(handler.call(arguments))
            .catch_unwind()
            .await
            .map_err(|panic| {
                AgentError::ExecutionError(format!(
                    "Tool {} panicked: {}",
                    name,
                    panic_message(panic.as_ref())
                ))
            })??;
        Ok(output.normalize())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
