//! Local web UI for the deskpilot agent.
//!
//! Serves a single-page chat UI plus a small JSON API on the loopback
//! interface. One conversation at a time: the agent sits behind a mutex
//! and a second chat request while a turn is running gets a 409.

use anyhow::{Context, Result};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use deskpilot::{default_config_path, Agent, AgentConfig, AgentError, AgentEvent};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

pub const DEFAULT_PORT: u16 = 8787;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    config_path: PathBuf,
    /// Lazily-built agent; `None` until the first chat request.
    agent: Arc<Mutex<Option<Agent>>>,
}

impl AppState {
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            agent: Arc::new(Mutex::new(None)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/config", get(get_config).post(set_config))
        .route("/api/chat", post(chat))
        .route("/api/reset", post(reset))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

/// Bind the UI on the loopback interface and serve until ctrl-c.
pub async fn serve(port: u16) -> Result<()> {
    let config_path = default_config_path().context("resolving config path")?;
    let app = router(AppState::new(config_path));

    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("deskpilot web UI listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "deskpilot",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    match AgentConfig::load(&state.config_path) {
        Ok(config) => (StatusCode::OK, Json(redact_config(&config))),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct ConfigUpdate {
    api_key: Option<String>,
    model: Option<String>,
    max_output_tokens: Option<u32>,
    thinking_budget: Option<u32>,
    system_prompt: Option<String>,
    only_n_most_recent_images: Option<usize>,
}

async fn set_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> impl IntoResponse {
    let mut config = match AgentConfig::load(&state.config_path) {
        Ok(config) => config,
        Err(e) => return internal_error(e),
    };
    apply_update(&mut config, update);
    if let Err(e) = config.save(&state.config_path) {
        return internal_error(e);
    }
    // Rebuild the agent on the next chat so the new settings take effect.
    if let Ok(mut agent) = state.agent.try_lock() {
        *agent = None;
    }
    (StatusCode::OK, Json(redact_config(&config)))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "message must not be empty" })),
        );
    }

    let Ok(mut slot) = state.agent.try_lock() else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "agent is busy with another request" })),
        );
    };

    if slot.is_none() {
        let config = match AgentConfig::load(&state.config_path) {
            Ok(config) => config,
            Err(e) => return internal_error(e),
        };
        match Agent::new(config) {
            Ok(agent) => *slot = Some(agent),
            Err(e @ AgentError::MissingApiKey) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
            }
            Err(e) => return internal_error(e),
        }
    }
    let agent = slot.as_mut().unwrap();

    let mut events: Vec<Value> = Vec::new();
    let outcome = agent
        .run_turn(&request.message, |event| events.push(event_to_json(event)))
        .await;

    match outcome {
        Ok(()) => (StatusCode::OK, Json(json!({ "events": events }))),
        Err(e) => {
            error!("turn failed: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string(), "events": events })),
            )
        }
    }
}

async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    let Ok(mut slot) = state.agent.try_lock() else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "agent is busy with another request" })),
        );
    };
    if let Some(agent) = slot.as_mut() {
        agent.reset();
    }
    (StatusCode::OK, Json(json!({ "status": "reset" })))
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    error!("request failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

/// Config as exposed over the API: the key itself never leaves the host,
/// only whether one is present.
fn redact_config(config: &AgentConfig) -> Value {
    json!({
        "has_api_key": config.has_api_key(),
        "model": config.model,
        "max_output_tokens": config.max_output_tokens,
        "thinking_budget": config.thinking_budget,
        "system_prompt": config.system_prompt,
        "only_n_most_recent_images": config.only_n_most_recent_images,
    })
}

fn apply_update(config: &mut AgentConfig, update: ConfigUpdate) {
    if let Some(api_key) = update.api_key {
        config.api_key = api_key;
    }
    if let Some(model) = update.model {
        config.model = model;
    }
    if let Some(tokens) = update.max_output_tokens {
        config.max_output_tokens = tokens;
    }
    if let Some(budget) = update.thinking_budget {
        config.thinking_budget = budget;
    }
    if let Some(prompt) = update.system_prompt {
        config.system_prompt = prompt;
    }
    if let Some(n) = update.only_n_most_recent_images {
        config.only_n_most_recent_images = n;
    }
}

fn event_to_json(event: &AgentEvent) -> Value {
    match event {
        AgentEvent::Text(text) => json!({ "type": "text", "text": text }),
        AgentEvent::Thinking(text) => json!({ "type": "thinking", "text": text }),
        AgentEvent::ToolUse { id, name, input } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        AgentEvent::ToolResult { id, result } => json!({
            "type": "tool_result",
            "id": id,
            "output": result.output,
            "error": result.error,
            "image": result.base64_image,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().join("config.json"));
        (dir, state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_service_name() {
        let (_dir, state) = test_state();
        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "deskpilot");
    }

    #[tokio::test]
    async fn index_serves_html() {
        let (_dir, state) = test_state();
        let response = router(state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(std::str::from_utf8(&bytes).unwrap().contains("<html"));
    }

    #[tokio::test]
    async fn config_round_trip_never_returns_the_key() {
        let (_dir, state) = test_state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/config")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"api_key":"sk-secret","thinking_budget":0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["has_api_key"], true);
        assert_eq!(body["thinking_budget"], 0);
        assert!(body.get("api_key").is_none());

        let response = app
            .oneshot(Request::get("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["has_api_key"], true);
        assert!(body.to_string().find("sk-secret").is_none());
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (_dir, state) = test_state();
        let response = router(state)
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_without_api_key_is_a_client_error() {
        let (_dir, state) = test_state();
        // Ensure the env fallback does not leak into this test.
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return;
        }
        let response = router(state)
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("API key"));
    }

    #[tokio::test]
    async fn busy_agent_returns_conflict() {
        let (_dir, state) = test_state();
        // Hold the agent lock to simulate a turn in flight.
        let guard = state.agent.clone().try_lock_owned().unwrap();
        let response = router(state)
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        drop(guard);
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn reset_succeeds_with_no_agent() {
        let (_dir, state) = test_state();
        let response = router(state)
            .oneshot(Request::post("/api/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn partial_update_leaves_other_fields_alone() {
        let mut config = AgentConfig::default();
        apply_update(
            &mut config,
            ConfigUpdate {
                api_key: None,
                model: Some("claude-sonnet-4-20250514".into()),
                max_output_tokens: None,
                thinking_budget: None,
                system_prompt: None,
                only_n_most_recent_images: None,
            },
        );
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.max_output_tokens, AgentConfig::default().max_output_tokens);
    }
}
