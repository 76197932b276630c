#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use console_core::transport::{
    BackendClient, CONSOLE_PATH_HEALTH, CONSOLE_PATH_MESSAGE, CONSOLE_PATH_POLL,
    CONSOLE_PATH_REMOVE, CONSOLE_PATH_RESET, CONSOLE_PATH_TRANSCRIBE,
};
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

pub type SharedBackendState = Arc<Mutex<BackendState>>;

/// One conversation held by the mock backend. `log_version` is the number of
/// recorded updates; `/poll` returns every entry touched since `log_from`.
pub struct MockContext {
    pub id: String,
    pub no: u64,
    pub guid: String,
    pub logs: Vec<Value>,
    pub updates: Vec<usize>,
    pub progress: String,
    pub paused: bool,
}

impl MockContext {
    fn new(id: &str, no: u64) -> Self {
        Self {
            id: id.to_string(),
            no,
            guid: Uuid::new_v4().to_string(),
            logs: Vec::new(),
            updates: Vec::new(),
            progress: String::new(),
            paused: false,
        }
    }

    pub fn log(&mut self, kind: &str, heading: &str, content: &str, temp: bool) -> usize {
        let index = self.logs.len();
        self.logs.push(json!({
            "no": index,
            "type": kind,
            "heading": heading,
            "content": content,
            "temp": temp,
            "kvps": {}
        }));
        self.updates.push(index);
        index
    }

    pub fn update(&mut self, index: usize, content: &str, temp: bool) {
        if let Some(entry) = self.logs.get_mut(index) {
            entry["content"] = json!(content);
            entry["temp"] = json!(temp);
            self.updates.push(index);
        }
    }

    pub fn reset(&mut self) {
        self.logs.clear();
        self.updates.clear();
        self.guid = Uuid::new_v4().to_string();
        self.progress.clear();
    }

    pub fn version(&self) -> u64 {
        self.updates.len() as u64
    }

    fn output(&self, start: u64) -> Vec<Value> {
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let mut touched: Vec<usize> = self.updates.iter().skip(start).copied().collect();
        touched.sort_unstable();
        touched.dedup();
        touched
            .into_iter()
            .filter_map(|index| self.logs.get(index).cloned())
            .collect()
    }

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "no": self.no,
            "log_guid": self.guid,
            "log_version": self.version(),
            "log_length": self.logs.len(),
            "paused": self.paused
        })
    }
}

/// Holds a `/poll` response until the test releases it.
#[derive(Clone, Default)]
pub struct PollGate {
    pub arrived: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct BackendState {
    pub contexts: Vec<MockContext>,
    pub poll_requests: Vec<Value>,
    pub messages: Vec<Value>,
    pub transcribe_requests: Vec<Value>,
    pub transcribe_replies: VecDeque<(StatusCode, Value)>,
    pub failing_polls: u32,
    pub poll_gate: Option<PollGate>,
}

impl BackendState {
    /// Same lookup as the real backend: an empty id picks the first
    /// conversation, an unknown id creates it.
    pub fn context_mut(&mut self, id: &str) -> &mut MockContext {
        let position = if id.is_empty() {
            if self.contexts.is_empty() {
                None
            } else {
                Some(0)
            }
        } else {
            self.contexts.iter().position(|context| context.id == id)
        };

        match position {
            Some(position) => &mut self.contexts[position],
            None => {
                let no = self.contexts.len() as u64 + 1;
                let id = if id.is_empty() {
                    format!("ctx-{no}")
                } else {
                    id.to_string()
                };
                self.contexts.push(MockContext::new(&id, no));
                let last = self.contexts.len() - 1;
                &mut self.contexts[last]
            }
        }
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: SharedBackendState,
    handle: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = SharedBackendState::default();
        let app = Router::new()
            .route(CONSOLE_PATH_POLL, post(poll))
            .route(CONSOLE_PATH_MESSAGE, post(message))
            .route(CONSOLE_PATH_RESET, post(reset))
            .route(CONSOLE_PATH_REMOVE, post(remove))
            .route(CONSOLE_PATH_TRANSCRIBE, post(transcribe))
            .route(CONSOLE_PATH_HEALTH, get(|| async { "OK" }))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock backend listener should bind");
        let bind_addr = listener
            .local_addr()
            .expect("mock backend listener local address should exist");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock backend server should run");
        });

        Self {
            base_url: format!("http://{bind_addr}"),
            state,
            handle,
        }
    }

    pub fn client(&self) -> BackendClient {
        BackendClient::new(self.base_url.clone(), reqwest::Client::new())
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn string_field(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn poll(State(state): State<SharedBackendState>, Json(body): Json<Value>) -> Response {
    let (response, gate) = {
        let mut state = state.lock().await;
        state.poll_requests.push(body.clone());
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return (StatusCode::INTERNAL_SERVER_ERROR, "backend restarting").into_response();
        }

        let log_from = body.get("log_from").and_then(Value::as_u64).unwrap_or(0);
        let context = state.context_mut(&string_field(&body, "context"));
        let mut response = json!({
            "ok": true,
            "context": context.id,
            "logs": context.output(log_from),
            "log_guid": context.guid,
            "log_version": context.version(),
            "log_progress": context.progress,
            "paused": context.paused
        });
        response["contexts"] = Value::Array(
            state.contexts.iter().map(MockContext::summary).collect(),
        );
        (response, state.poll_gate.take())
    };

    if let Some(gate) = gate {
        gate.arrived.notify_one();
        gate.release.notified().await;
    }
    Json(response).into_response()
}

async fn message(State(state): State<SharedBackendState>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().await;
    state.messages.push(body.clone());
    let context = state.context_mut(&string_field(&body, "context"));
    context.log("user", "User message", &string_field(&body, "text"), false);
    context.log("agent", "Agent 0: generating", "", true);
    context.progress = "Agent 0: generating".to_string();
    Json(json!({"ok": true, "message": "Message received.", "context": context.id}))
}

async fn reset(State(state): State<SharedBackendState>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().await;
    state.context_mut(&string_field(&body, "context")).reset();
    Json(json!({"ok": true, "message": "Agent restarted."}))
}

async fn remove(State(state): State<SharedBackendState>, Json(body): Json<Value>) -> Json<Value> {
    let id = string_field(&body, "context");
    let mut state = state.lock().await;
    state.contexts.retain(|context| context.id != id);
    Json(json!({"ok": true, "message": "Context removed."}))
}

async fn transcribe(State(state): State<SharedBackendState>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().await;
    state.transcribe_requests.push(body);
    let (status, reply) = state
        .transcribe_replies
        .pop_front()
        .unwrap_or((StatusCode::OK, json!({"text": ""})));
    (status, Json(reply)).into_response()
}
