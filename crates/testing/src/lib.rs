//! In-process stand-in for a ComfyUI server, shared by the integration
//! tests of the workspace crates.
//!
//! Serves `POST /prompt`, `GET /history/{prompt_id}` and
//! `GET /system_stats` on an ephemeral port. History replies follow a
//! script: poll N gets entry N, and the last entry repeats.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const PROMPT_ID: &str = "prompt-abc-123";

/// One scripted HTTP reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Raw(u16, &'static str),
    /// Hold the request open for the given time, then answer with an
    /// empty history.
    Stall(Duration),
    /// Drop the connection without sending a response.
    Hangup,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Json(200, body)
    }

    /// History before the prompt shows up.
    pub fn empty() -> Self {
        Reply::Json(200, json!({}))
    }

    pub fn outputs(outputs: Value) -> Self {
        Reply::Json(200, json!({ PROMPT_ID: { "outputs": outputs } }))
    }

    async fn respond(self) -> Response {
        match self {
            Reply::Json(status, body) => (status_code(status), Json(body)).into_response(),
            Reply::Raw(status, body) => (status_code(status), body).into_response(),
            Reply::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Json(json!({})).into_response()
            }
            // Unwinding out of the handler aborts the connection task,
            // which closes the socket mid-request. `resume_unwind` skips
            // the panic hook, so the test output stays clean.
            Reply::Hangup => std::panic::resume_unwind(Box::new("stub hangup")),
        }
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

struct StubState {
    submit_reply: Reply,
    history_script: Vec<Reply>,
    submissions: Mutex<Vec<Value>>,
    polls: AtomicUsize,
}

/// Handle to a running stub engine. Dropping it stops the server.
pub struct StubEngine {
    pub base_url: String,
    state: Arc<StubState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StubEngine {
    /// Start a stub that accepts every submission.
    pub async fn start(history_script: Vec<Reply>) -> Self {
        Self::start_with_submit(
            Reply::ok(json!({ "prompt_id": PROMPT_ID, "number": 1 })),
            history_script,
        )
        .await
    }

    pub async fn start_with_submit(submit_reply: Reply, history_script: Vec<Reply>) -> Self {
        let state = Arc::new(StubState {
            submit_reply,
            history_script,
            submissions: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/prompt", post(submit))
            .route("/history/{prompt_id}", get(history))
            .route("/system_stats", get(system_stats))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub engine");
        let addr = listener.local_addr().expect("stub engine address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Number of `GET /history` requests received so far.
    pub fn polls(&self) -> usize {
        self.state.polls.load(Ordering::SeqCst)
    }

    /// Bodies received on `POST /prompt`, in order.
    pub fn submissions(&self) -> Vec<Value> {
        self.state
            .submissions
            .lock()
            .expect("submissions lock")
            .clone()
    }
}

impl Drop for StubEngine {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}

/// A base URL nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    let addr = listener.local_addr().expect("throwaway listener address");
    drop(listener);
    format!("http://{addr}")
}

async fn submit(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    state
        .submissions
        .lock()
        .expect("submissions lock")
        .push(body);
    state.submit_reply.clone().respond().await
}

async fn history(State(state): State<Arc<StubState>>, Path(prompt_id): Path<String>) -> Response {
    let n = state.polls.fetch_add(1, Ordering::SeqCst);
    if prompt_id != PROMPT_ID {
        return Reply::empty().respond().await;
    }
    state
        .history_script
        .get(n)
        .or_else(|| state.history_script.last())
        .cloned()
        .unwrap_or_else(Reply::empty)
        .respond()
        .await
}

async fn system_stats() -> Json<Value> {
    Json(json!({ "system": { "comfyui_version": "0.3.40" }, "devices": [] }))
}
