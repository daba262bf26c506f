//! Mock Ollama server for integration tests
//!
//! Serves `/api/generate` and `/api/tags` with per-model behavior

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// How the mock answers generate calls for one model
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answer after the given delay
    Delay(Duration),
    /// Reply with HTTP 500
    Fail,
}

/// Mock Ollama backend with predictable answers
pub struct MockOllama {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    behaviors: HashMap<String, Behavior>,
    generated: Mutex<Vec<String>>,
    unloaded: Mutex<Vec<String>>,
}

impl MockOllama {
    /// Start a mock that answers every model immediately
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(HashMap::new()).await
    }

    /// Start a mock with special behavior for some models
    pub async fn start_with(behaviors: HashMap<String, Behavior>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            behaviors,
            ..MockState::default()
        });

        let app = Router::new()
            .route("/api/generate", routing::post(handle_generate))
            .route("/api/tags", routing::get(handle_tags))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Models that received a prompt, in call order
    pub fn generated(&self) -> Vec<String> {
        self.state.generated.lock().unwrap().clone()
    }

    /// Models that received an unload request
    pub fn unloaded(&self) -> Vec<String> {
        self.state.unloaded.lock().unwrap().clone()
    }
}

impl Drop for MockOllama {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    keep_alive: Option<u32>,
}

async fn handle_generate(State(state): State<Arc<MockState>>, Json(req): Json<GenerateRequest>) -> impl IntoResponse {
    if req.keep_alive == Some(0) && req.prompt.is_none() {
        state.unloaded.lock().unwrap().push(req.model.clone());
        return Json(serde_json::json!({ "model": req.model, "response": "", "done": true })).into_response();
    }

    state.generated.lock().unwrap().push(req.model.clone());

    match state.behaviors.get(&req.model) {
        Some(Behavior::Fail) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "mock server intentional failure" })),
            )
                .into_response();
        }
        Some(Behavior::Delay(delay)) => tokio::time::sleep(*delay).await,
        None => {}
    }

    Json(serde_json::json!({
        "model": req.model,
        "response": format!("reply from {}", req.model),
        "done": true,
    }))
    .into_response()
}

async fn handle_tags() -> impl IntoResponse {
    Json(serde_json::json!({
        "models": [
            { "name": "llama3.2:3b" },
            { "name": "qwen3-coder-30b-local:latest" },
            { "name": "llama3.1:70b" },
        ]
    }))
}
