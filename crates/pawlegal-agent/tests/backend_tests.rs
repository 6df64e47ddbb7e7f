use pawlegal_agent::{AzureOpenAiBackend, OllamaBackend};
use pawlegal_core::{
    agent::ChatBackend,
    types::{ChatMessage, ToolDefinition},
};
use serde_json::json;
use tracing_test::traced_test;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn search_tool() -> ToolDefinition {
    ToolDefinition {
        name: "search_legal_database".into(),
        description: "Search the animal law database".into(),
        parameters: json!({
            "type": "object",
            "properties": { "query_string": { "type": "string" } }
        }),
    }
}

fn history() -> Vec<ChatMessage> {
    vec![ChatMessage::system("You are a legal assistant."), ChatMessage::user("Find bear cases")]
}

// =============================================================================
// Azure OpenAI
// =============================================================================

#[tokio::test]
#[traced_test]
async fn test_azure_parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-4o/chat/completions"))
        .and(query_param("api-version", "2024-08-01-preview"))
        .and(header("api-key", "secret"))
        .and(body_partial_json(json!({
            "tool_choice": "auto",
            "tools": [{ "type": "function", "function": { "name": "search_legal_database" } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": { "name": "search_legal_database", "arguments": "{\"query_string\":\"bear\"}" }
                    }]
                }
            }]
        })))
        .mount(&server)
        .await;

    let backend =
        AzureOpenAiBackend::new(format!("{}/openai/deployments/gpt-4o", server.uri()), "secret");
    let turn = backend.complete(&history(), &[search_tool()]).await.unwrap();

    assert_eq!(turn.content, "");
    assert_eq!(turn.tool_calls.len(), 1);
    assert_eq!(turn.tool_calls[0].id, "call_abc");
    assert_eq!(turn.tool_calls[0].name, "search_legal_database");
    assert_eq!(turn.tool_calls[0].arguments, r#"{"query_string":"bear"}"#);
    assert!(logs_contain("azure response received"));
}

#[tokio::test]
async fn test_azure_plain_text_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "finish_reason": "stop", "message": { "role": "assistant", "content": "Here is a strategy." } }]
        })))
        .mount(&server)
        .await;

    let backend = AzureOpenAiBackend::new(server.uri(), "secret");
    let turn = backend.complete(&history(), &[]).await.unwrap();
    assert_eq!(turn.content, "Here is a strategy.");
    assert!(turn.tool_calls.is_empty());
}

#[tokio::test]
async fn test_azure_throttling_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit is exceeded."))
        .mount(&server)
        .await;

    let backend = AzureOpenAiBackend::new(server.uri(), "secret");
    let err = backend.complete(&history(), &[]).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("429"));
    assert!(msg.contains("Rate limit is exceeded."));
}

#[tokio::test]
async fn test_azure_empty_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let backend = AzureOpenAiBackend::new(server.uri(), "secret");
    assert!(backend.complete(&history(), &[]).await.is_err());
}

// =============================================================================
// Ollama
// =============================================================================

#[tokio::test]
async fn test_ollama_tool_call_arguments_become_strings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "llama3.1", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{ "function": { "name": "search_legal_database", "arguments": { "query_string": "bear" } } }]
            },
            "done": true
        })))
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(server.uri(), "llama3.1");
    let turn = backend.complete(&history(), &[search_tool()]).await.unwrap();
    assert_eq!(turn.tool_calls.len(), 1);
    assert_eq!(turn.tool_calls[0].id, "call_2_0");
    let args: serde_json::Value = serde_json::from_str(&turn.tool_calls[0].arguments).unwrap();
    assert_eq!(args, json!({ "query_string": "bear" }));
}

#[tokio::test]
async fn test_ollama_non_200_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(server.uri(), "missing");
    let err = backend.complete(&history(), &[]).await.unwrap_err();
    assert!(err.to_string().contains("model not found"));
}
