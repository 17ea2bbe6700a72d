use std::time::Duration;

use async_trait::async_trait;
use boardroom_common::{BoardroomError, Result, ToolDefinition};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage, ToolCall};
use crate::stream::{SseDecoder, StreamAccumulator, StreamEvent};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAiFunctionDef,
}

#[derive(Serialize)]
struct OpenAiFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OpenAiMessage {
    role: String,
    // Assistant turns that only call tools carry `content: null`.
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OpenAiToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: OpenAiFunctionCall,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    model: String,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiStreamToolCall>,
}

#[derive(Deserialize)]
struct OpenAiStreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    #[serde(default)]
    function: OpenAiStreamFunction,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamFunction {
    name: Option<String>,
    #[serde(default)]
    arguments: String,
}

/// Client for OpenAI-compatible `/v1/chat/completions` endpoints.
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, model: String, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    /// Use a request timeout for every call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    fn role_to_string(role: &Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn build_messages(request: &LlmRequest) -> Vec<OpenAiMessage> {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system_prompt {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }
        for msg in &request.messages {
            messages.push(Self::convert_message(msg));
        }
        messages
    }

    fn convert_message(msg: &ChatMessage) -> OpenAiMessage {
        OpenAiMessage {
            role: Self::role_to_string(&msg.role).to_string(),
            content: msg.content.clone(),
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|c| OpenAiToolCall {
                    id: c.id.clone(),
                    kind: function_type(),
                    function: OpenAiFunctionCall {
                        name: c.name.clone(),
                        arguments: c.arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|t| OpenAiTool {
                kind: "function",
                function: OpenAiFunctionDef {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_request_body(&self, request: &LlmRequest, stream: bool) -> OpenAiRequest {
        OpenAiRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: Self::build_messages(request),
            tools: Self::convert_tools(&request.tools),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn send(&self, body: &OpenAiRequest) -> Result<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut http_req = self.http_client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req.send().await.map_err(|e| {
            if e.is_timeout() {
                BoardroomError::Timeout(format!("OpenAI request: {e}"))
            } else {
                BoardroomError::Llm(format!("OpenAI request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body_text = response.text().await.unwrap_or_default();
            return Err(BoardroomError::Provider {
                status: status.as_u16(),
                message: body_text,
                retry_after_secs,
            });
        }

        Ok(response)
    }

    fn convert_tool_calls(calls: Vec<OpenAiToolCall>) -> Vec<ToolCall> {
        calls
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let body = self.build_request_body(&request, false);
        let response = self.send(&body).await?;

        let oai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| BoardroomError::Llm(format!("Failed to parse OpenAI response: {e}")))?;

        let choice = oai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BoardroomError::Llm("No choices in OpenAI response".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content,
            tool_calls: Self::convert_tool_calls(choice.message.tool_calls),
            model: oai_response.model,
            usage: oai_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        sink: mpsc::Sender<StreamEvent>,
    ) -> Result<LlmResponse> {
        let body = self.build_request_body(&request, true);
        let response = self.send(&body).await?;

        let mut acc = StreamAccumulator::new(body.model.clone());
        let mut decoder = SseDecoder::new();
        let mut bytes = response.bytes_stream();
        let mut done = false;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    BoardroomError::Timeout(format!("OpenAI stream: {e}"))
                } else {
                    BoardroomError::Llm(format!("OpenAI stream interrupted: {e}"))
                }
            })?;
            for payload in decoder.push(&chunk) {
                if apply_stream_payload(&payload, &mut acc, &sink).await? {
                    done = true;
                }
            }
            if done {
                break;
            }
        }
        if !done {
            if let Some(payload) = decoder.finish() {
                apply_stream_payload(&payload, &mut acc, &sink).await?;
            }
        }

        let response = acc.into_response();
        debug!(
            model = %response.model,
            tool_calls = response.tool_calls.len(),
            finish_reason = ?response.finish_reason,
            "OpenAI stream finished"
        );
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Apply one SSE payload. Returns `true` on the `[DONE]` sentinel.
async fn apply_stream_payload(
    payload: &str,
    acc: &mut StreamAccumulator,
    sink: &mpsc::Sender<StreamEvent>,
) -> Result<bool> {
    if payload == "[DONE]" {
        return Ok(true);
    }

    let value: Value = serde_json::from_str(payload).map_err(|e| {
        BoardroomError::Llm(format!("Failed to parse OpenAI stream chunk: {e}"))
    })?;
    // Providers report failures after a 200 as an `error` object in the stream.
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(BoardroomError::Llm(format!("OpenAI stream error: {message}")));
    }
    let chunk: OpenAiStreamChunk = serde_json::from_value(value).map_err(|e| {
        BoardroomError::Llm(format!("Failed to parse OpenAI stream chunk: {e}"))
    })?;

    acc.set_model(&chunk.model);
    if let Some(usage) = chunk.usage {
        acc.set_usage(TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        });
    }

    for choice in chunk.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                acc.push_content(&content);
                // A dropped receiver only means nobody is watching.
                let _ = sink.send(StreamEvent::ContentDelta(content)).await;
            }
        }
        for tc in choice.delta.tool_calls {
            let started = acc.push_tool_fragment(
                tc.index,
                tc.id.as_deref(),
                tc.function.name.as_deref(),
                &tc.function.arguments,
            );
            if let Some(event) = started {
                let _ = sink.send(event).await;
            }
        }
        if let Some(reason) = choice.finish_reason {
            acc.set_finish_reason(&reason);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardroom_common::ToolDefinition;

    fn sample_request() -> LlmRequest {
        LlmRequest {
            system_prompt: Some("Be helpful.".to_string()),
            messages: vec![ChatMessage::user("Hello")],
            temperature: Some(0.5),
            max_tokens: Some(512),
            ..Default::default()
        }
    }

    #[test]
    fn request_body_matches_openai_format() {
        let client = OpenAiClient::new(None, "gpt-4o".to_string(), Some("sk-test".to_string()));
        let body = client.build_request_body(&sample_request(), false);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["max_tokens"], 512);
        assert!(json.get("stream").is_none());
        assert!(json.get("tools").is_none());

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "Be helpful.");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Hello");
    }

    #[test]
    fn request_body_includes_tools_and_tool_turns() {
        let client = OpenAiClient::new(None, "gpt-4o".to_string(), None);
        let mut request = sample_request();
        request.tools = vec![ToolDefinition {
            name: "add".to_string(),
            description: "Add two numbers".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        request.messages.push(ChatMessage::assistant(
            None,
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "add".to_string(),
                arguments: "{\"a\":1,\"b\":2}".to_string(),
            }],
        ));
        request
            .messages
            .push(ChatMessage::tool_result("call_1", "{\"result\":3}"));

        let json = serde_json::to_value(client.build_request_body(&request, false)).unwrap();

        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "add");

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages[2]["role"], "assistant");
        assert!(messages[2]["content"].is_null());
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["tool_calls"][0]["type"], "function");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], "{\"a\":1,\"b\":2}");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn streaming_body_requests_usage() {
        let client = OpenAiClient::new(None, "gpt-4o".to_string(), None);
        let json =
            serde_json::to_value(client.build_request_body(&sample_request(), true)).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["stream_options"]["include_usage"], true);
    }

    #[test]
    fn request_model_override_wins() {
        let client = OpenAiClient::new(None, "gpt-4o".to_string(), None);
        let mut request = sample_request();
        request.model = Some("gpt-4o-mini".to_string());
        let body = client.build_request_body(&request, false);
        assert_eq!(body.model, "gpt-4o-mini");
    }

    #[test]
    fn default_base_url_is_openai() {
        let client = OpenAiClient::new(None, "gpt-4o".to_string(), None);
        assert_eq!(client.base_url, "https://api.openai.com");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = OpenAiClient::new(
            Some("http://localhost:11434/".to_string()),
            "llama3".to_string(),
            None,
        );
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn stream_payload_updates_accumulator() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut acc = StreamAccumulator::new("gpt-4o");

        let chunk = r#"{"model":"gpt-4o-2024-08-06","choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        assert!(!apply_stream_payload(chunk, &mut acc, &tx).await.unwrap());
        let last = r#"{"model":"gpt-4o-2024-08-06","choices":[{"delta":{},"finish_reason":"stop"}],"usage":null}"#;
        apply_stream_payload(last, &mut acc, &tx).await.unwrap();
        assert!(apply_stream_payload("[DONE]", &mut acc, &tx).await.unwrap());

        assert_eq!(rx.recv().await, Some(StreamEvent::ContentDelta("Hi".to_string())));
        let response = acc.into_response();
        assert_eq!(response.content.as_deref(), Some("Hi"));
        assert_eq!(response.model, "gpt-4o-2024-08-06");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn malformed_stream_payload_is_an_error() {
        let (tx, _rx) = mpsc::channel(1);
        let mut acc = StreamAccumulator::new("gpt-4o");
        assert!(apply_stream_payload("{not json", &mut acc, &tx).await.is_err());
    }

    #[tokio::test]
    async fn error_payload_mid_stream_is_an_error() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut acc = StreamAccumulator::new("gpt-4o");
        let chunk = r#"{"model":"gpt-4o","choices":[{"delta":{"content":"Milk"},"finish_reason":null}]}"#;
        apply_stream_payload(chunk, &mut acc, &tx).await.unwrap();

        let failure = r#"{"error":{"message":"The server had an error","type":"server_error"}}"#;
        let err = apply_stream_payload(failure, &mut acc, &tx).await.unwrap_err();
        assert!(matches!(err, BoardroomError::Llm(_)));
        assert!(err.to_string().contains("The server had an error"), "{err}");
        assert_eq!(rx.recv().await, Some(StreamEvent::ContentDelta("Milk".to_string())));
    }
}
