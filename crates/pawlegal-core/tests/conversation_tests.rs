use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use pawlegal_core::{
    agent::{ChatBackend, NoTools, ToolSet},
    conversation::{AgentSettings, Conversation},
    types::{AssistantTurn, ChatMessage, Role, ToolCall, ToolDefinition},
};

/// Replays canned turns and records what it was sent.
struct QueueBackend {
    turns: Mutex<VecDeque<Result<AssistantTurn>>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl QueueBackend {
    fn new(turns: Vec<Result<AssistantTurn>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for QueueBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<AssistantTurn> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("queue exhausted")))
    }

    fn name(&self) -> &str {
        "queue"
    }
}

struct EchoTools {
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ToolSet for EchoTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "echo".into(),
            description: "Echo the arguments back".into(),
            parameters: serde_json::json!({ "type": "object" }),
        }]
    }

    async fn call(&self, name: &str, arguments: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.to_string()));
        if name != "echo" {
            bail!("unknown tool: {name}");
        }
        Ok(format!("echo:{arguments}"))
    }
}

fn tool_turn(id: &str, name: &str, args: &str) -> AssistantTurn {
    AssistantTurn {
        content: String::new(),
        tool_calls: vec![ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args.into(),
        }],
    }
}

#[tokio::test]
async fn test_plain_reply_is_returned() {
    let backend = Arc::new(QueueBackend::new(vec![Ok(AssistantTurn::text("hello"))]));
    let mut conv = Conversation::new(
        backend.clone(),
        Arc::new(NoTools),
        "sys",
        AgentSettings::immediate(),
    );

    let reply = conv.send("hi").await.unwrap();
    assert_eq!(reply, "hello");

    let roles: Vec<Role> = conv.history().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(conv.history()[0].content, "sys");
}

#[tokio::test]
async fn test_tool_results_are_fed_back() {
    let backend = Arc::new(QueueBackend::new(vec![
        Ok(tool_turn("c1", "echo", r#"{"x":1}"#)),
        Ok(AssistantTurn::text("used the tool")),
    ]));
    let tools = Arc::new(EchoTools { calls: Mutex::new(Vec::new()) });
    let mut conv = Conversation::new(
        backend.clone(),
        tools.clone(),
        "sys",
        AgentSettings::immediate(),
    );

    let reply = conv.send("go").await.unwrap();
    assert_eq!(reply, "used the tool");
    assert_eq!(backend.calls(), 2);

    let tool_msg = &conv.history()[3];
    assert_eq!(tool_msg.role, Role::Tool);
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
    assert_eq!(tool_msg.content, r#"echo:{"x":1}"#);

    // Second model call saw the tool result.
    let seen = backend.seen.lock().unwrap();
    assert_eq!(seen[1].last().unwrap().role, Role::Tool);
}

#[tokio::test]
async fn test_tool_errors_become_text() {
    let backend = Arc::new(QueueBackend::new(vec![
        Ok(tool_turn("c1", "missing", "{}")),
        Ok(AssistantTurn::text("recovered")),
    ]));
    let tools = Arc::new(EchoTools { calls: Mutex::new(Vec::new()) });
    let mut conv = Conversation::new(backend, tools, "sys", AgentSettings::immediate());

    assert_eq!(conv.send("go").await.unwrap(), "recovered");
    let tool_msg = &conv.history()[3];
    assert!(tool_msg.content.starts_with("Error:"));
    assert!(tool_msg.content.contains("unknown tool: missing"));
}

#[tokio::test]
async fn test_failed_call_is_retried_once() {
    let backend = Arc::new(QueueBackend::new(vec![
        Err(anyhow!("429 too many requests")),
        Ok(AssistantTurn::text("after backoff")),
    ]));
    let mut conv = Conversation::new(
        backend.clone(),
        Arc::new(NoTools),
        "sys",
        AgentSettings::immediate(),
    );

    assert_eq!(conv.send("hi").await.unwrap(), "after backoff");
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_second_failure_is_an_error() {
    let backend = Arc::new(QueueBackend::new(vec![
        Err(anyhow!("429")),
        Err(anyhow!("429 again")),
    ]));
    let mut conv = Conversation::new(backend, Arc::new(NoTools), "sys", AgentSettings::immediate());

    let err = conv.send("hi").await.unwrap_err();
    assert!(format!("{err:#}").contains("429 again"));
}

#[tokio::test]
async fn test_tool_rounds_are_bounded() {
    let turns = (0..5)
        .map(|i| Ok(tool_turn(&format!("c{i}"), "echo", "{}")))
        .collect();
    let backend = Arc::new(QueueBackend::new(turns));
    let tools = Arc::new(EchoTools { calls: Mutex::new(Vec::new()) });
    let settings = AgentSettings {
        max_tool_rounds: 3,
        ..AgentSettings::immediate()
    };
    let mut conv = Conversation::new(backend.clone(), tools.clone(), "sys", settings);

    let err = conv.send("loop").await.unwrap_err();
    assert!(err.to_string().contains("3 model calls"));
    assert_eq!(backend.calls(), 3);
    assert_eq!(tools.calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_history_persists_across_turns() {
    let backend = Arc::new(QueueBackend::new(vec![
        Ok(AssistantTurn::text("one")),
        Ok(AssistantTurn::text("two")),
    ]));
    let mut conv = Conversation::new(
        backend.clone(),
        Arc::new(NoTools),
        "sys",
        AgentSettings::immediate(),
    );

    conv.send("first").await.unwrap();
    conv.send("second").await.unwrap();

    let seen = backend.seen.lock().unwrap();
    let contents: Vec<&str> = seen[1].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["sys", "first", "one", "second"]);
}
