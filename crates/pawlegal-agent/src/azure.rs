use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use pawlegal_core::{
    agent::ChatBackend,
    types::{AssistantTurn, ChatMessage, ToolCall, ToolDefinition},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Calls an Azure OpenAI chat-completions deployment with function calling.
///
/// `endpoint` is the deployment URL, e.g.
/// `https://<hub>.openai.azure.com/openai/deployments/gpt-4o`.
pub struct AzureOpenAiBackend {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl AzureOpenAiBackend {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: "2024-08-01-preview".into(),
            timeout_secs: 300,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.api_version
        )
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall<'a>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    /// Null on assistant turns that only carry tool calls.
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn to_wire(m: &ChatMessage) -> WireMessage<'_> {
    let content = if m.content.is_empty() && !m.tool_calls.is_empty() {
        None
    } else {
        Some(m.content.as_str())
    };
    WireMessage {
        role: m.role.as_str(),
        content,
        tool_calls: m
            .tool_calls
            .iter()
            .map(|c| WireToolCall {
                id: &c.id,
                kind: "function",
                function: WireFunctionCall {
                    name: &c.name,
                    arguments: &c.arguments,
                },
            })
            .collect(),
        tool_call_id: m.tool_call_id.as_deref(),
    }
}

fn build_request<'a>(
    messages: &'a [ChatMessage],
    tools: &'a [ToolDefinition],
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        messages: messages.iter().map(to_wire).collect(),
        tools: tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect(),
        tool_choice: (!tools.is_empty()).then_some("auto"),
    }
}

#[async_trait]
impl ChatBackend for AzureOpenAiBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn> {
        let body = build_request(messages, tools);

        info!(
            messages = messages.len(),
            tools = tools.len(),
            endpoint = %self.endpoint,
            "calling azure chat completions"
        );

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()?;

        let response = client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("azure openai request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "azure openai returned non-200: {}", text);
            bail!("Azure OpenAI error {}: {}", status, text);
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to parse Azure OpenAI response")?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            bail!("Azure OpenAI returned no choices");
        };

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect();
        let content = choice.message.content.unwrap_or_default();

        info!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or(""),
            tool_calls = tool_calls.len(),
            output_len = content.len(),
            "azure response received"
        );

        Ok(AssistantTurn { content, tool_calls })
    }

    fn name(&self) -> &str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_includes_api_version() {
        let b =
            AzureOpenAiBackend::new("https://hub.openai.azure.com/openai/deployments/gpt-4o/", "k");
        assert_eq!(
            b.url(),
            "https://hub.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-08-01-preview"
        );
    }

    #[test]
    fn tool_only_assistant_turn_has_null_content() {
        let msgs = vec![
            ChatMessage::user("find cases"),
            ChatMessage::assistant(AssistantTurn {
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call_1".into(),
                    name: "search_legal_database".into(),
                    arguments: "{}".into(),
                }],
            }),
            ChatMessage::tool_result("call_1", "[]"),
        ];
        let v = serde_json::to_value(build_request(&msgs, &[])).unwrap();
        assert!(v.get("tools").is_none());
        assert!(v.get("tool_choice").is_none());
        assert!(v["messages"][1]["content"].is_null());
        assert_eq!(v["messages"][1]["tool_calls"][0]["type"], "function");
        assert_eq!(v["messages"][1]["tool_calls"][0]["function"]["name"], "search_legal_database");
        assert_eq!(v["messages"][2]["role"], "tool");
        assert_eq!(v["messages"][2]["tool_call_id"], "call_1");
        assert!(v["messages"][0].get("tool_calls").is_none());
    }
}
