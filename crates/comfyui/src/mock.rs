//! In-process fake ComfyUI server for integration tests.
//!
//! Serves `POST /prompt`, `GET /history/{id}` and `GET /view` on an
//! ephemeral localhost port. Each prompt stays absent from the history
//! for a configurable number of polls, then reports `is_processing`,
//! then completes with the configured outputs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Node id the default outputs place the image under.
pub const DEFAULT_SAVE_NODE: &str = "9";

/// Filename the default outputs report for the produced image.
pub const DEFAULT_IMAGE_FILENAME: &str = "ComfyUI_00001_.png";

/// Encode a small gradient PNG.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 37) as u8, (y * 53) as u8, 128])
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    buf.into_inner()
}

/// `outputs` map with one image on `node_id`.
pub fn outputs_with_image(node_id: &str, filename: &str) -> Value {
    json!({
        node_id: {
            "images": [{ "filename": filename, "subfolder": "", "type": "output" }]
        }
    })
}

#[derive(Debug, Clone)]
struct Behaviour {
    pending_polls: usize,
    processing_polls: usize,
    never_complete: bool,
    outputs: Value,
    image: Vec<u8>,
    reject_status: Option<u16>,
    omit_prompt_id: bool,
    execution_error: Option<String>,
}

#[derive(Debug, Default)]
struct Recorded {
    submit_attempts: usize,
    submissions: Vec<Value>,
    polls: HashMap<String, usize>,
    views: Vec<HashMap<String, String>>,
}

struct MockState {
    behaviour: Behaviour,
    recorded: Mutex<Recorded>,
}

impl MockState {
    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("mock engine state poisoned")
    }
}

/// Builder for [`MockEngine`].
#[derive(Debug, Clone)]
pub struct MockEngineBuilder {
    behaviour: Behaviour,
}

impl Default for MockEngineBuilder {
    fn default() -> Self {
        Self {
            behaviour: Behaviour {
                pending_polls: 1,
                processing_polls: 1,
                never_complete: false,
                outputs: outputs_with_image(DEFAULT_SAVE_NODE, DEFAULT_IMAGE_FILENAME),
                image: sample_png(8, 6),
                reject_status: None,
                omit_prompt_id: false,
                execution_error: None,
            },
        }
    }
}

impl MockEngineBuilder {
    /// Polls answered with an empty history before the prompt appears.
    pub fn pending_polls(mut self, n: usize) -> Self {
        self.behaviour.pending_polls = n;
        self
    }

    /// Polls answered with `is_processing: true`.
    pub fn processing_polls(mut self, n: usize) -> Self {
        self.behaviour.processing_polls = n;
        self
    }

    /// Never list the prompt in the history.
    pub fn never_complete(mut self) -> Self {
        self.behaviour.never_complete = true;
        self
    }

    /// The `outputs` map of the completed entry.
    pub fn outputs(mut self, outputs: Value) -> Self {
        self.behaviour.outputs = outputs;
        self
    }

    /// Bytes served by `/view`.
    pub fn image(mut self, bytes: Vec<u8>) -> Self {
        self.behaviour.image = bytes;
        self
    }

    /// Answer `/prompt` with this status and an error body.
    pub fn reject_submissions(mut self, status: u16) -> Self {
        self.behaviour.reject_status = Some(status);
        self
    }

    /// Answer `/prompt` with 200 but no `prompt_id`.
    pub fn omit_prompt_id(mut self) -> Self {
        self.behaviour.omit_prompt_id = true;
        self
    }

    /// Complete prompts with an `execution_error` status.
    pub fn fail_execution(mut self, message: impl Into<String>) -> Self {
        self.behaviour.execution_error = Some(message.into());
        self
    }

    /// Bind to an ephemeral localhost port and start serving.
    pub async fn start(self) -> MockEngine {
        let state = Arc::new(MockState {
            behaviour: self.behaviour,
            recorded: Mutex::new(Recorded::default()),
        });

        let app = Router::new()
            .route("/prompt", post(submit))
            .route("/history/{prompt_id}", get(history))
            .route("/view", get(view))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock engine");
        let addr = listener.local_addr().expect("mock engine address");

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock engine stopped");
            }
        });

        MockEngine { addr, state, task }
    }
}

/// A running fake ComfyUI instance. Stops when dropped.
pub struct MockEngine {
    addr: SocketAddr,
    state: Arc<MockState>,
    task: tokio::task::JoinHandle<()>,
}

impl MockEngine {
    pub fn builder() -> MockEngineBuilder {
        MockEngineBuilder::default()
    }

    /// Start with the default behaviour.
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every `/prompt` request received, rejected ones included.
    pub fn submit_attempts(&self) -> usize {
        self.state.recorded().submit_attempts
    }

    /// Bodies accepted by `/prompt`, in arrival order.
    pub fn submissions(&self) -> Vec<Value> {
        self.state.recorded().submissions.clone()
    }

    /// History queries received for `prompt_id`.
    pub fn polls(&self, prompt_id: &str) -> usize {
        self.state
            .recorded()
            .polls
            .get(prompt_id)
            .copied()
            .unwrap_or(0)
    }

    /// Query strings received by `/view`.
    pub fn views(&self) -> Vec<HashMap<String, String>> {
        self.state.recorded().views.clone()
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn submit(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let behaviour = &state.behaviour;
    let mut recorded = state.recorded();
    recorded.submit_attempts += 1;

    if let Some(status) = behaviour.reject_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
        let body = json!({
            "error": { "type": "prompt_outputs_failed_validation", "message": "Prompt outputs failed validation" },
            "node_errors": {}
        });
        return (status, Json(body)).into_response();
    }

    recorded.submissions.push(body);
    let number = recorded.submissions.len();

    if behaviour.omit_prompt_id {
        return Json(json!({ "number": number, "node_errors": {} })).into_response();
    }

    Json(json!({
        "prompt_id": format!("prompt-{number}"),
        "number": number,
        "node_errors": {}
    }))
    .into_response()
}

async fn history(
    State(state): State<Arc<MockState>>,
    Path(prompt_id): Path<String>,
) -> Json<Value> {
    let behaviour = &state.behaviour;
    let polls = {
        let mut recorded = state.recorded();
        let count = recorded.polls.entry(prompt_id.clone()).or_insert(0);
        *count += 1;
        *count
    };

    if behaviour.never_complete || polls <= behaviour.pending_polls {
        return Json(json!({}));
    }

    if polls <= behaviour.pending_polls + behaviour.processing_polls {
        return Json(json!({ prompt_id: { "is_processing": true, "outputs": {} } }));
    }

    let status = match &behaviour.execution_error {
        Some(message) => json!({
            "status_str": "error",
            "completed": false,
            "messages": [["execution_error", { "node_id": "3", "exception_message": message }]]
        }),
        None => json!({ "status_str": "success", "completed": true, "messages": [] }),
    };

    Json(json!({
        prompt_id: { "outputs": behaviour.outputs, "status": status }
    }))
}

async fn view(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.recorded().views.push(params);
    (
        [(header::CONTENT_TYPE, "image/png")],
        state.behaviour.image.clone(),
    )
        .into_response()
}
