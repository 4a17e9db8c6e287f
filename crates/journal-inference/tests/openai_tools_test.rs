//! Integration tests for tool calling through the OpenAI-compatible backend.

#![cfg(feature = "openai")]

use journal_inference::openai::{OpenAIBackend, OpenAIConfig};
use journal_inference::{
    ChatBackend, ChatInvocation, FunctionPayload, PromptMessage, RawToolCall, ToolDefinition,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> OpenAIBackend {
    OpenAIBackend::new(OpenAIConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        gen_model: "test-gen".to_string(),
        ..Default::default()
    })
    .expect("Failed to create backend")
}

#[tokio::test]
async fn test_typed_tool_calls_become_objects() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-gen",
            "tools": [{"type": "function", "function": {"name": "retrieve_entries"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_xyz",
                        "type": "function",
                        "function": {"name": "retrieve_entries", "arguments": "{\"query\":\"family\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let invocation = ChatInvocation::messages(vec![PromptMessage::human("Tell me about family")])
        .with_tools(vec![ToolDefinition {
            name: "retrieve_entries".to_string(),
            description: "Retrieve relevant journal entries".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }]);

    let completion = backend_for(&server).chat(invocation).await.unwrap();

    assert_eq!(completion.text, "");
    assert_eq!(completion.tool_calls.len(), 1);
    let call = &completion.tool_calls[0];
    assert_eq!(call.call_id(), Some("call_xyz"));
    match call {
        RawToolCall::Object(obj) => match &obj.function {
            Some(FunctionPayload::Object(attr)) => {
                assert_eq!(attr.name.as_deref(), Some("retrieve_entries"));
            }
            other => panic!("Expected typed function, got {:?}", other),
        },
        other => panic!("Expected object, got {:?}", other),
    }
}

#[tokio::test]
async fn test_follow_up_echoes_tool_call_and_result() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                {"role": "user", "content": "q"},
                {"role": "assistant", "tool_calls": [{"id": "call_xyz", "function": {"name": "retrieve_entries"}}]},
                {"role": "tool", "tool_call_id": "call_xyz", "content": "entries"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-2",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "You wrote about your sister."},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tool_call = RawToolCall::Mapping(serde_json::json!({
        "id": "call_xyz",
        "function": {"name": "retrieve_entries", "arguments": "{\"query\":\"family\"}"}
    }));
    let invocation = ChatInvocation::messages(vec![
        PromptMessage::human("q"),
        PromptMessage::Assistant {
            content: String::new(),
            tool_calls: vec![tool_call],
        },
        PromptMessage::Tool {
            name: "retrieve_entries".to_string(),
            content: "entries".to_string(),
            call_id: Some("call_xyz".to_string()),
        },
    ]);

    let completion = backend_for(&server).chat(invocation).await.unwrap();
    assert_eq!(completion.text, "You wrote about your sister.");
}

#[tokio::test]
async fn test_auth_failure_maps_to_config_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Invalid API key", "type": "invalid_request_error", "code": "invalid_api_key"}
        })))
        .mount(&server)
        .await;

    let err = backend_for(&server)
        .chat(ChatInvocation::prompt("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, journal_inference::Error::Config(_)));
}

#[tokio::test]
async fn test_empty_choices_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-3",
            "choices": []
        })))
        .mount(&server)
        .await;

    let result = backend_for(&server).chat(ChatInvocation::prompt("hi")).await;
    assert!(matches!(result, Err(journal_inference::Error::Inference(_))));
}
