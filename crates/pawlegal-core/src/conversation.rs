use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::{
    agent::{ChatBackend, ToolSet},
    config::Config,
    types::{AssistantTurn, ChatMessage, ToolCall},
};

/// Pacing and bounds for a conversation.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Pause before each user turn, to stay under the model's rate limit.
    pub turn_delay: Duration,
    /// Pause before retrying a failed model call.
    pub throttle_backoff: Duration,
    /// Model calls allowed per user turn before giving up.
    pub max_tool_rounds: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            turn_delay: Duration::from_secs(5),
            throttle_backoff: Duration::from_secs(40),
            max_tool_rounds: 25,
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            turn_delay: Duration::from_secs(config.agent_turn_delay_s),
            throttle_backoff: Duration::from_secs(config.agent_throttle_backoff_s),
            max_tool_rounds: config.agent_max_tool_rounds.max(1),
        }
    }

    /// No pauses; for tests and local backends.
    pub fn immediate() -> Self {
        Self {
            turn_delay: Duration::ZERO,
            throttle_backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// One agent thread: a system prompt plus every message exchanged so far.
///
/// Each `send` runs a reason/act loop: the model either answers in text or
/// asks for tools, whose results are fed back until it answers.
pub struct Conversation {
    backend: Arc<dyn ChatBackend>,
    tools: Arc<dyn ToolSet>,
    settings: AgentSettings,
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        tools: Arc<dyn ToolSet>,
        system_prompt: &str,
        settings: AgentSettings,
    ) -> Self {
        Self {
            backend,
            tools,
            settings,
            history: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Send a user message and return the model's final text reply.
    pub async fn send(&mut self, text: &str) -> Result<String> {
        if !self.settings.turn_delay.is_zero() {
            tokio::time::sleep(self.settings.turn_delay).await;
        }
        self.history.push(ChatMessage::user(text));

        for round in 0..self.settings.max_tool_rounds {
            let turn = self.complete_with_retry().await?;
            let calls = turn.tool_calls.clone();
            self.history.push(ChatMessage::assistant(turn));

            if calls.is_empty() {
                let reply = self
                    .history
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                info!(
                    backend = self.backend.name(),
                    rounds = round + 1,
                    reply_len = reply.len(),
                    "agent replied"
                );
                return Ok(reply);
            }

            for call in &calls {
                let result = self.run_tool(call).await;
                self.history.push(ChatMessage::tool_result(&call.id, result));
            }
            debug!(round, calls = calls.len(), "tool round complete");
        }

        bail!(
            "agent did not produce a reply within {} model calls",
            self.settings.max_tool_rounds
        )
    }

    async fn complete_with_retry(&self) -> Result<AssistantTurn> {
        let definitions = self.tools.definitions();
        match self.backend.complete(&self.history, &definitions).await {
            Ok(turn) => Ok(turn),
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    backoff_s = self.settings.throttle_backoff.as_secs(),
                    "model call failed, retrying once: {e:#}"
                );
                tokio::time::sleep(self.settings.throttle_backoff).await;
                self.backend
                    .complete(&self.history, &definitions)
                    .await
                    .with_context(|| format!("{} call failed after retry", self.backend.name()))
            }
        }
    }

    /// Tool errors go back to the model as text so it can adjust its query.
    async fn run_tool(&self, call: &ToolCall) -> String {
        info!(tool = %call.name, args = %call.arguments, "calling tool");
        match self.tools.call(&call.name, &call.arguments).await {
            Ok(out) => {
                debug!(tool = %call.name, output_len = out.len(), "tool finished");
                out
            }
            Err(e) => {
                warn!(tool = %call.name, "tool failed: {e:#}");
                format!("Error: {e:#}")
            }
        }
    }
}
