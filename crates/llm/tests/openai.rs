use boardroom_common::{BoardroomError, ToolDefinition};
use boardroom_llm::{ChatMessage, LlmClient, LlmRequest, OpenAiClient, StreamEvent};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(
        Some(server.uri()),
        "gpt-4o".to_string(),
        Some("sk-test".to_string()),
    )
}

fn question() -> LlmRequest {
    LlmRequest {
        system_prompt: Some("You are a finance agent.".to_string()),
        messages: vec![ChatMessage::user("What is the price of AMUL?")],
        ..Default::default()
    }
}

#[tokio::test]
async fn complete_parses_plain_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Dairy margins are thin."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server).complete(question()).await.unwrap();
    assert_eq!(response.content.as_deref(), Some("Dairy margins are thin."));
    assert_eq!(response.model, "gpt-4o-2024-08-06");
    assert_eq!(response.usage.unwrap().completion_tokens, 5);
    assert!(!response.wants_tools());
}

#[tokio::test]
async fn complete_parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "get_current_stock_price"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "get_current_stock_price",
                            "arguments": "{\"symbol\":\"NESTLEIND.NS\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&server)
        .await;

    let mut request = question();
    request.tools = vec![ToolDefinition {
        name: "get_current_stock_price".to_string(),
        description: "Current price for a ticker".to_string(),
        parameters: json!({"type": "object", "properties": {"symbol": {"type": "string"}}}),
    }];

    let response = client_for(&server).complete(request).await.unwrap();
    assert!(response.content.is_none());
    assert!(response.wants_tools());
    assert_eq!(response.tool_calls[0].id, "call_abc");
    assert_eq!(response.tool_calls[0].arguments, "{\"symbol\":\"NESTLEIND.NS\"}");
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).complete(question()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("401"), "{msg}");
    assert!(msg.contains("bad key"), "{msg}");
    assert!(matches!(err, BoardroomError::Provider { status: 401, .. }));
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).complete(question()).await.unwrap_err();
    match err {
        BoardroomError::Provider {
            status,
            retry_after_secs,
            ..
        } => {
            assert_eq!(status, 429);
            assert_eq!(retry_after_secs, Some(7));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn stream_error_event_fails_the_call() {
    let server = MockServer::start().await;
    let sse = concat!(
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"Start \"},\"finish_reason\":null}]}\n\n",
        "data: {\"error\":{\"message\":\"overloaded\",\"type\":\"server_error\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let (tx, _rx) = mpsc::channel(16);
    let err = client_for(&server)
        .complete_stream(question(), tx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("overloaded"), "{err}");
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": []
        })))
        .mount(&server)
        .await;

    assert!(client_for(&server).complete(question()).await.is_err());
}

#[tokio::test]
async fn stream_forwards_deltas_and_assembles_answer() {
    let server = MockServer::start().await;
    let sse = concat!(
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"},\"finish_reason\":null}]}\n\n",
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"Start \"},\"finish_reason\":null}]}\n\n",
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"small.\"},\"finish_reason\":null}]}\n\n",
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"model\":\"gpt-4o\",\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::channel(16);
    let response = client_for(&server)
        .complete_stream(question(), tx)
        .await
        .unwrap();

    let mut deltas = Vec::new();
    while let Some(event) = rx.recv().await {
        if let StreamEvent::ContentDelta(text) = event {
            deltas.push(text);
        }
    }
    assert_eq!(deltas, vec!["Start ".to_string(), "small.".to_string()]);
    assert_eq!(response.content.as_deref(), Some("Start small."));
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert_eq!(response.usage.unwrap().prompt_tokens, 9);
}

#[tokio::test]
async fn stream_assembles_tool_call_fragments() {
    let server = MockServer::start().await;
    let sse = concat!(
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"type\":\"function\",\"function\":{\"name\":\"duckduckgo_search\",\"arguments\":\"\"}}]},\"finish_reason\":null}]}\n\n",
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"query\\\":\"}}]},\"finish_reason\":null}]}\n\n",
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"milk prices\\\"}\"}}]},\"finish_reason\":null}]}\n\n",
        "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::channel(16);
    let response = client_for(&server)
        .complete_stream(question(), tx)
        .await
        .unwrap();

    assert_eq!(
        rx.recv().await,
        Some(StreamEvent::ToolCallStarted {
            index: 0,
            name: "duckduckgo_search".to_string()
        })
    );
    assert!(response.content.is_none());
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].id, "call_1");
    assert_eq!(response.tool_calls[0].arguments, "{\"query\":\"milk prices\"}");
}
