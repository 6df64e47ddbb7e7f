use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AssistantTurn, ChatMessage, ToolDefinition};

/// A hosted or local chat-completion model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the full history and the available tools, returning the next
    /// assistant turn. Throttling and transport failures are errors.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn>;

    fn name(&self) -> &str;
}

/// The lookup tools the model may invoke.
#[async_trait]
pub trait ToolSet: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run tool `name` with a raw JSON argument object.
    async fn call(&self, name: &str, arguments: &str) -> Result<String>;
}

/// A tool set with nothing in it.
pub struct NoTools;

#[async_trait]
impl ToolSet for NoTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn call(&self, name: &str, _arguments: &str) -> Result<String> {
        anyhow::bail!("unknown tool: {name}")
    }
}
