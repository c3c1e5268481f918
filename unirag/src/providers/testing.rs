//! A fake model backend served over loopback HTTP for provider tests.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

type Recorded = Arc<Mutex<Vec<(String, Value)>>>;

#[derive(Clone)]
struct BackendState {
    chat: Value,
    embed: Value,
    status: StatusCode,
    requests: Recorded,
}

/// Serves canned chat and embedding responses and records every request body.
pub(crate) struct FakeBackend {
    url: String,
    requests: Recorded,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    /// Answer chat routes with `chat` and embedding routes with `embed`.
    pub async fn spawn(chat: Value, embed: Value) -> Self {
        Self::start(chat, embed, StatusCode::OK).await
    }

    /// Answer every route with a 503 and an error body.
    pub async fn failing() -> Self {
        let body = json!({"error": {"message": "backend overloaded"}});
        Self::start(body.clone(), body, StatusCode::SERVICE_UNAVAILABLE).await
    }

    async fn start(chat: Value, embed: Value, status: StatusCode) -> Self {
        let requests = Recorded::default();
        let state = BackendState { chat, embed, status, requests: requests.clone() };
        let app = Router::new()
            .route("/chat/completions", post(chat_route))
            .route("/chat", post(chat_route))
            .route("/embeddings", post(embed_route))
            .route("/embed", post(embed_route))
            .with_state(state);

        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server run");
        });

        Self { url: format!("http://{addr}"), requests, handle }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    /// Body of the most recent request sent to `path`.
    pub fn last_request(&self, path: &str) -> Option<Value> {
        let requests = self.requests.lock().expect("requests lock");
        requests.iter().rev().find(|(p, _)| p == path).map(|(_, body)| body.clone())
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn record(state: &BackendState, uri: &Uri, body: Value) {
    state.requests.lock().expect("requests lock").push((uri.path().to_string(), body));
}

async fn chat_route(
    State(state): State<BackendState>,
    uri: Uri,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, &uri, body);
    (state.status, Json(state.chat.clone()))
}

async fn embed_route(
    State(state): State<BackendState>,
    uri: Uri,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, &uri, body);
    (state.status, Json(state.embed.clone()))
}
