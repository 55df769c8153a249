//! In-process HTTP backend for exercising the real transport
//!
//! Serves the document on `GET /api?action=getMenu&token=...` wrapped in an
//! anti-hijacking prefix and a `result` envelope, and stores pushes sent as
//! `POST /api` with `{action, menu, token}`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

struct BackendState {
    token: String,
    document: Mutex<Value>,
    pushes: AtomicUsize,
}

pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Start serving `document` on an ephemeral port
    pub async fn start(token: &str, document: Value) -> Self {
        let state = Arc::new(BackendState {
            token: token.to_string(),
            document: Mutex::new(document),
            pushes: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api", get(get_menu).post(set_menu))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock backend failed");
        });

        Self { addr, state, server }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn document(&self) -> Value {
        self.state.document.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> usize {
        self.state.pushes.load(Ordering::SeqCst)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn get_menu(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    if params.get("action").map(String::as_str) != Some("getMenu") {
        return (StatusCode::BAD_REQUEST, "unknown action".to_string());
    }
    if params.get("token") != Some(&state.token) {
        return (StatusCode::UNAUTHORIZED, "bad token".to_string());
    }
    let document = state.document.lock().unwrap().clone();
    (StatusCode::OK, format!(")]}}'\n{}", json!({ "result": document })))
}

async fn set_menu(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if body["action"] != "setMenu" || body["token"] != state.token.as_str() {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "rejected" })));
    }
    state.pushes.fetch_add(1, Ordering::SeqCst);
    let menu = body["menu"].clone();
    *state.document.lock().unwrap() = menu.clone();
    (StatusCode::OK, Json(json!({ "ok": true, "menu": menu })))
}
