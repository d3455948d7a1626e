//! These models represent the objects passed around by the engine
//!
//! There are a few related formats we need to interact with:
//! - chat messages posted by callers, which may include a previous turn's output
//! - openai style messages/tools, sent from the agent to the model provider
//! - tool invocations, sent from the agent to the tools in its catalog
//!
//! The internal structs mirror the openai chat shape closely, since that is what callers
//! send back to us on the next turn. Provider specific conversion lives in `providers::utils`.
pub mod message;
pub mod role;
pub mod tool;
