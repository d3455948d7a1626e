use async_trait::async_trait;
use serde_json::Value;

use super::{ToolHandler, ToolOutput};
use crate::errors::AgentResult;
use crate::models::tool::Tool;

/// A tool backed by a plain closure over the decoded arguments
pub struct FunctionTool<F> {
    tool: Tool,
    function: F,
}

impl<F> FunctionTool<F>
where
    F: Fn(Value) -> AgentResult<ToolOutput> + Send + Sync,
{
    pub fn new<N, D>(name: N, description: D, parameters: Value, function: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            tool: Tool::new(name, description, parameters),
            function,
        }
    }
}

#[async_trait]
impl<F> ToolHandler for FunctionTool<F>
where
    F: Fn(Value) -> AgentResult<ToolOutput> + Send + Sync,
{
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<ToolOutput> {
        (self.function)(arguments)
    }
}
