//! HTTP route handlers for the API.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use boardroom_common::{BoardroomError, RunResponse, preview, strip_ansi};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Request body for every agent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Response body for every agent endpoint, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
    pub agent_name: String,
    pub status: ResponseStatus,
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn success(agent_name: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            agent_name: agent_name.into(),
            status: ResponseStatus::Success,
            error: None,
        }
    }

    pub fn error(agent_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            response: String::new(),
            agent_name: agent_name.into(),
            status: ResponseStatus::Error,
            error: Some(error.into()),
        }
    }
}

/// An [`AgentResponse`] paired with its status code.
pub struct Reply(StatusCode, AgentResponse);

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

/// Ask the whole team.
pub async fn team_response(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Reply {
    let name = state.team.name().to_string();
    let query = match accept(&name, payload) {
        Ok(query) => query,
        Err(reply) => return reply,
    };

    info!(agent = %name, query = %preview(&query, 50), "Received team query");
    finish(&name, state.team.run(&query).await)
}

/// Ask a single member by slug.
pub async fn agent_response(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Reply {
    let agent = match state.team.member(&slug) {
        Ok(agent) => agent.clone(),
        Err(e) => return Reply(StatusCode::NOT_FOUND, AgentResponse::error(slug, e.to_string())),
    };
    let name = agent.name().to_string();
    let query = match accept(&name, payload) {
        Ok(query) => query,
        Err(reply) => return reply,
    };

    info!(agent = %name, query = %preview(&query, 50), "Received agent query");
    finish(&name, agent.run(&query).await)
}

/// Unpack the request body, turning rejections and blank queries into 4xx replies.
fn accept(name: &str, payload: Result<Json<QueryRequest>, JsonRejection>) -> Result<String, Reply> {
    let Json(request) = payload.map_err(|rejection| {
        Reply(
            rejection.status(),
            AgentResponse::error(name, rejection.body_text()),
        )
    })?;

    let query = request.query.trim();
    if query.is_empty() {
        return Err(Reply(
            StatusCode::UNPROCESSABLE_ENTITY,
            AgentResponse::error(name, "query must not be empty"),
        ));
    }
    Ok(query.to_string())
}

fn finish(name: &str, result: boardroom_common::Result<RunResponse>) -> Reply {
    match result {
        Ok(run) => {
            let text = strip_ansi(&run.content);
            let text = text.trim();
            if text.is_empty() {
                error!(agent = %name, "Query produced an empty answer");
                return Reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    AgentResponse::error(
                        name,
                        format!("Error processing query for {name}: the agent returned no answer"),
                    ),
                );
            }
            Reply(StatusCode::OK, AgentResponse::success(name, text))
        }
        Err(e) => {
            error!(agent = %name, error = %e, "Query failed");
            Reply(
                status_for(&e),
                AgentResponse::error(name, format!("Error processing query for {name}: {e}")),
            )
        }
    }
}

fn status_for(error: &BoardroomError) -> StatusCode {
    match error {
        BoardroomError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
