use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use pawlegal_core::{
    agent::ChatBackend,
    types::{AssistantTurn, ChatMessage, ToolCall, ToolDefinition},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Calls a locally-hosted Ollama model via its native chat API.
///
/// Useful for development without Azure credentials, or when the user's
/// case details must not leave the local machine. Tool calling needs a
/// model that supports it (llama3.1, qwen2.5, ...); others answer in plain
/// text and never search the databases.
pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 300,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    /// Ollama sends and expects a JSON object here, not a string.
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Serialize)]
struct OllamaTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

fn to_ollama(m: &ChatMessage) -> OllamaMessage {
    OllamaMessage {
        role: m.role.as_str().into(),
        content: m.content.clone(),
        tool_calls: m
            .tool_calls
            .iter()
            .map(|c| OllamaToolCall {
                function: OllamaFunctionCall {
                    name: c.name.clone(),
                    arguments: serde_json::from_str(&c.arguments)
                        .unwrap_or_else(|_| serde_json::json!({})),
                },
            })
            .collect(),
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn> {
        let request_body = OllamaChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(to_ollama).collect(),
            tools: tools
                .iter()
                .map(|t| OllamaTool {
                    kind: "function",
                    function: t,
                })
                .collect(),
            stream: false,
        };

        info!(
            model = %self.model,
            base_url = %self.base_url,
            messages = messages.len(),
            "calling ollama chat API"
        );

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()?;

        let response = match client.post(&url).json(&request_body).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(timeout_secs = self.timeout_secs, "ollama request timed out");
                bail!("Ollama request timed out after {}s", self.timeout_secs);
            }
            Err(e) => {
                warn!("ollama request failed: {}", e);
                bail!("Ollama request failed: {}", e);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "ollama returned non-200: {}", body);
            bail!("Ollama error {}: {}", status, body);
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .context("failed to parse Ollama response")?;

        // Ollama does not assign call ids; number them within the turn.
        let tool_calls: Vec<ToolCall> = parsed
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, c)| ToolCall {
                id: format!("call_{}_{}", messages.len(), i),
                name: c.function.name,
                arguments: c.function.arguments.to_string(),
            })
            .collect();

        info!(
            output_len = parsed.message.content.len(),
            tool_calls = tool_calls.len(),
            "ollama response received"
        );

        Ok(AssistantTurn {
            content: parsed.message.content,
            tool_calls,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
