//! Integration tests for the API layer.
//!
//! These tests spin up a real HTTP server on a random port, backed by a team
//! whose model is scripted.

use std::sync::Arc;

use async_trait::async_trait;
use boardroom_api::{AppState, create_router};
use boardroom_common::{BoardroomError, Result};
use boardroom_llm::{LlmClient, LlmRequest, LlmResponse};
use boardroom_team::{
    API_KEY_ENV, BoardroomConfig, ServerConfig, Team, TeamSettings, default_roster,
};
use boardroom_tools::{Toolbox, ToolsConfig};

/// Answers every agent directly. Queries containing "FAIL" fail and those
/// containing "BLANK" get nothing but escape codes back.
struct EchoClient;

#[async_trait]
impl LlmClient for EchoClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let query = request
            .messages
            .first()
            .and_then(|m| m.content.clone())
            .unwrap_or_default();
        if query.contains("FAIL") {
            return Err(BoardroomError::Llm("OpenAI API error 503: overloaded".to_string()));
        }
        if query.contains("BLANK") {
            return Ok(LlmResponse {
                content: Some("\x1b[1m\x1b[0m \n".to_string()),
                model: "echo".to_string(),
                ..Default::default()
            });
        }
        let system = request.system_prompt.unwrap_or_default();
        let speaker = if system.contains("<team_members>") {
            "team"
        } else {
            "member"
        };
        Ok(LlmResponse {
            content: Some(format!("\x1b[1m{speaker}\x1b[0m answer to: {query}\n")),
            model: "echo".to_string(),
            ..Default::default()
        })
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// Spin up a test server on a random port and return the base URL.
async fn start_test_server(server: ServerConfig) -> String {
    let toolbox = Toolbox::with_client(&ToolsConfig::default(), reqwest::Client::new());
    let team = Team::build(
        &TeamSettings::default(),
        default_roster(),
        Arc::new(EchoClient),
        &toolbox,
    )
    .unwrap();
    let state = Arc::new(AppState::with_team(Arc::new(team), server));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Helper to GET a URL and return (status, body_string).
async fn get(base: &str, path: &str) -> (u16, String) {
    let resp = reqwest::Client::new()
        .get(format!("{}{}", base, path))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}

/// Helper to POST JSON and return (status, parsed body).
async fn post_json(base: &str, path: &str, json: &str) -> (u16, serde_json::Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .header("content-type", "application/json")
        .body(json.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    let json = serde_json::from_str(&body)
        .unwrap_or_else(|e| panic!("body is not JSON ({e}): {body}"));
    (status, json)
}

/// Exactly one of `response` and `error` is populated.
fn assert_envelope(json: &serde_json::Value) {
    match json["status"].as_str().unwrap() {
        "success" => {
            assert!(!json["response"].as_str().unwrap().is_empty());
            assert!(json["error"].is_null());
        }
        "error" => {
            assert_eq!(json["response"], "");
            assert!(!json["error"].as_str().unwrap().is_empty());
        }
        other => panic!("unexpected status {other}"),
    }
}

// ============================================================================
// Health and UI
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let base = start_test_server(ServerConfig::default()).await;
    let (status, body) = get(&base, "/api/v1/health").await;
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json, serde_json::json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_index_serves_ui() {
    let base = start_test_server(ServerConfig::default()).await;
    let (status, body) = get(&base, "/").await;
    assert_eq!(status, 200);
    assert!(body.contains("Dairy Products Business Setup Assistant"));
}

// ============================================================================
// Team endpoint
// ============================================================================

#[tokio::test]
async fn test_team_endpoint() {
    let base = start_test_server(ServerConfig::default()).await;
    let (status, json) = post_json(
        &base,
        "/api/v1/agent-response",
        r#"{"query": "Start a dairy in Pune"}"#,
    )
    .await;
    assert_eq!(status, 200);
    assert_envelope(&json);
    assert_eq!(json["agent_name"], "Agent Team");
    // ANSI codes and trailing whitespace are stripped.
    assert_eq!(json["response"], "team answer to: Start a dairy in Pune");
}

#[tokio::test]
async fn test_team_failure_is_error_envelope() {
    let base = start_test_server(ServerConfig::default()).await;
    let (status, json) = post_json(&base, "/api/v1/agent-response", r#"{"query": "FAIL"}"#).await;
    assert_eq!(status, 500);
    assert_envelope(&json);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .starts_with("Error processing query for Agent Team")
    );
}

// ============================================================================
// Member endpoints
// ============================================================================

#[tokio::test]
async fn test_every_member_endpoint() {
    let base = start_test_server(ServerConfig::default()).await;
    let expected = [
        ("web-agent", "Web Agent"),
        ("finance-agent", "Finance Agent"),
        ("business-agent", "Business Agent"),
        ("market-sales-agent", "Market & Sales Agent"),
        ("rd-agent", "R&D Agent"),
        ("supply-chain-agent", "Supply Chain & Logistics Agent"),
        ("advisory-agent", "Mentors & Advisors Agent"),
    ];
    for (slug, name) in expected {
        let (status, json) = post_json(
            &base,
            &format!("/api/v1/{slug}"),
            r#"{"query": "Milk prices"}"#,
        )
        .await;
        assert_eq!(status, 200, "{slug}");
        assert_envelope(&json);
        assert_eq!(json["agent_name"], name);
        assert_eq!(json["response"], "member answer to: Milk prices");
    }
}

#[tokio::test]
async fn test_member_failure_is_500() {
    let base = start_test_server(ServerConfig::default()).await;
    let (status, json) =
        post_json(&base, "/api/v1/finance-agent", r#"{"query": "FAIL now"}"#).await;
    assert_eq!(status, 500);
    assert_envelope(&json);
    assert_eq!(json["agent_name"], "Finance Agent");
}

#[tokio::test]
async fn test_escape_only_answer_is_error_envelope() {
    let base = start_test_server(ServerConfig::default()).await;
    for path in ["/api/v1/agent-response", "/api/v1/web-agent"] {
        let (status, json) = post_json(&base, path, r#"{"query": "BLANK"}"#).await;
        assert_eq!(status, 500, "{path}");
        assert_envelope(&json);
        assert_eq!(json["status"], "error");
    }
}

#[tokio::test]
async fn test_unknown_agent_is_404() {
    let base = start_test_server(ServerConfig::default()).await;
    let (status, json) = post_json(&base, "/api/v1/legal-agent", r#"{"query": "Hi"}"#).await;
    assert_eq!(status, 404);
    assert_envelope(&json);
    assert_eq!(json["agent_name"], "legal-agent");
}

// ============================================================================
// Malformed requests
// ============================================================================

#[tokio::test]
async fn test_malformed_bodies_are_4xx() {
    let base = start_test_server(ServerConfig::default()).await;
    for body in [
        "not json",
        r#"{"question": "Hi"}"#,
        r#"{"query": 42}"#,
        r#"{"query": "   "}"#,
    ] {
        let (status, json) = post_json(&base, "/api/v1/agent-response", body).await;
        assert!((400..500).contains(&status), "{body}: {status}");
        assert_envelope(&json);
    }
}

#[tokio::test]
async fn test_payload_too_large() {
    let server = ServerConfig {
        max_body_bytes: 1024,
        ..Default::default()
    };
    let base = start_test_server(server).await;
    let large = "x".repeat(4096);
    let (status, json) = post_json(
        &base,
        "/api/v1/web-agent",
        &format!(r#"{{"query": "{}"}}"#, large),
    )
    .await;
    assert_eq!(status, 413, "Expected 413 Payload Too Large, got {}", status);
    assert_envelope(&json);
}

// ============================================================================
// Startup
// ============================================================================

#[test]
fn test_state_requires_api_key() {
    let config = BoardroomConfig::default();
    let err = match AppState::new_with(&config, |_| None) {
        Ok(_) => panic!("state built without a credential"),
        Err(e) => e,
    };
    assert!(matches!(err, BoardroomError::Config(_)));
    assert!(err.to_string().contains(API_KEY_ENV), "{err}");

    let blank = AppState::new_with(&config, |key| {
        (key == API_KEY_ENV).then(|| "   ".to_string())
    });
    assert!(blank.is_err());
}

#[test]
fn test_state_builds_with_env_key() {
    let config = BoardroomConfig::default();
    let state = AppState::new_with(&config, |key| {
        (key == API_KEY_ENV).then(|| "sk-test".to_string())
    })
    .unwrap();
    assert_eq!(state.team.name(), "Agent Team");
    assert_eq!(state.team.members().len(), 7);
}
