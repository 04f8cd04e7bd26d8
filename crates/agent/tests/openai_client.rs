//! HTTP contract tests for the OpenAI-compatible client using wiremock.

use std::sync::Arc;

use serde_json::json;
use triage_agent::llm::{BackendError, ChatBackend, ChatMessage, ChatRequest, ToolSpec};
use triage_agent::openai::OpenAiCompatClient;
use triage_agent::runtime::TriageRouter;
use triage_agent::tutors;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiCompatClient {
    OpenAiCompatClient::new(server.uri(), "local-anything".to_string().into())
}

fn request() -> ChatRequest {
    ChatRequest {
        model: "gpt-oss:20b".to_string(),
        messages: vec![ChatMessage::system("Be brief."), ChatMessage::user("Hello")],
        tools: Vec::new(),
        output_schema: None,
    }
}

fn text_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": "gpt-oss:20b",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn handoff_completion(tool: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-124",
        "object": "chat.completion",
        "model": "gpt-oss:20b",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": tool, "arguments": "{}"}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
}

#[tokio::test]
async fn complete_posts_to_v1_chat_completions_with_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer local-anything"))
        .and(body_partial_json(json!({"model": "gpt-oss:20b"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("Hi there!")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server).complete(request()).await.expect("completion succeeds");

    assert_eq!(response.content.as_deref(), Some("Hi there!"));
    assert!(response.tool_calls.is_empty());
}

#[tokio::test]
async fn tools_are_sent_and_tool_calls_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "transfer_to_math_tutor"}}]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(handoff_completion("transfer_to_math_tutor")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut request = request();
    request.tools.push(ToolSpec {
        name: "transfer_to_math_tutor".to_string(),
        description: "Specialist agent for math questions".to_string(),
    });

    let response = client(&server).complete(request).await.expect("completion succeeds");

    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "transfer_to_math_tutor");
}

#[tokio::test]
async fn non_success_status_is_reported_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let error = client(&server).complete(request()).await.expect_err("404 is an error");

    assert!(matches!(
        error,
        BackendError::Status { status: 404, ref body } if body == "model not found"
    ));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let error = client(&server).complete(request()).await.expect_err("html is not a completion");

    assert!(matches!(error, BackendError::MalformedResponse(_)));
}

#[tokio::test]
async fn router_runs_end_to_end_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"tools": [{"type": "function"}]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(handoff_completion("transfer_to_history_tutor")),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(text_completion("George Washington.")),
        )
        .mount(&server)
        .await;

    let registry = tutors::tutor_registry("gpt-oss:20b").expect("stock roster is valid");
    let router = TriageRouter::new(Arc::new(registry), Arc::new(client(&server)));

    let outcome = router
        .route_input("who was the first president of the united states?")
        .await
        .expect("routed over http");

    assert_eq!(outcome.final_output(), Some("George Washington."));
}
