pub mod agent;
pub mod buffer;
pub mod context;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod token_counter;
pub mod tools;
