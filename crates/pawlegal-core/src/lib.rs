pub mod agent;
pub mod config;
pub mod conversation;
pub mod prompts;
pub mod script;
pub mod sources;
pub mod types;

pub use types::*;
