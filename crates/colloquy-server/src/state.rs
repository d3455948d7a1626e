use anyhow::Result;
use colloquy::{
    agent::Agent,
    context::StaticContext,
    prompts::prompt_source,
    providers::factory::get_provider,
    registry::ModelRegistry,
    tools::ToolRegistry,
};
use std::sync::Arc;

use crate::configuration::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
}

impl AppState {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }

    /// Wire the agent and its collaborators from settings
    pub fn from_settings(settings: Settings, tools: ToolRegistry) -> Result<Self> {
        let provider = get_provider(settings.provider.into_config())?;
        let prompts = prompt_source(settings.prompts.remote())?;

        let mut agent = Agent::new(
            provider,
            Arc::new(ModelRegistry::builtin()),
            settings.engine.agent_config(),
        )?
        .with_tools(Arc::new(tools))
        .with_prompts(prompts);

        if !settings.context.snippets.is_empty() {
            agent = agent.with_context(Arc::new(StaticContext::new(settings.context.snippets)));
        }

        Ok(Self::new(agent))
    }
}
