//! Common test utilities - ComicTest harness for end-to-end testing
//!
//! `FakeUpstream` stands in for the chat provider, the image predictions API
//! and the persistence service on one random port. `ComicTest` runs a real
//! comicd server pointed at it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use comicd::client::{ApiClient, Board};
use comicd::persistence::PersistenceClient;
use comicd::{Config, Server};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the fake chat provider answers
#[derive(Debug, Clone)]
pub enum StoryReply {
    /// Three SNOWBUNNY panels built from the user prompt
    Echo,
    /// Raw message content (`None` sends `null`)
    Content(Option<String>),
    /// A 200 with an empty `choices` array
    NoChoices,
    /// Fail with this status
    Status(u16),
}

/// How the fake predictions API behaves
#[derive(Debug, Clone)]
pub enum ImageMode {
    /// Prediction succeeds in the create call
    Immediate,
    /// Prediction starts and succeeds after this many polls
    Polled(usize),
}

/// Shared, scriptable state of the fake upstream
pub struct FakeState {
    pub addr: Mutex<Option<SocketAddr>>,
    pub story_reply: Mutex<StoryReply>,
    pub image_mode: Mutex<ImageMode>,
    /// Delay before answering a prediction
    pub image_delay: Mutex<Duration>,
    /// Prompts containing any of these fail their prediction
    pub failing_prompts: Mutex<Vec<String>>,
    /// Host used in generated image URLs
    pub image_host: Mutex<String>,
    pub save_status: Mutex<u16>,
    pub history: Mutex<Value>,

    pub chat_requests: Mutex<Vec<Value>>,
    pub prediction_requests: Mutex<Vec<(String, Value)>>,
    pub saves: Mutex<Vec<Value>>,
    pub auth_headers: Mutex<Vec<String>>,
    pub polls: AtomicUsize,
    images: AtomicUsize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            addr: Mutex::new(None),
            story_reply: Mutex::new(StoryReply::Echo),
            image_mode: Mutex::new(ImageMode::Immediate),
            image_delay: Mutex::new(Duration::ZERO),
            failing_prompts: Mutex::new(Vec::new()),
            image_host: Mutex::new("replicate.delivery".to_string()),
            save_status: Mutex::new(200),
            history: Mutex::new(json!([])),
            chat_requests: Mutex::new(Vec::new()),
            prediction_requests: Mutex::new(Vec::new()),
            saves: Mutex::new(Vec::new()),
            auth_headers: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
            images: AtomicUsize::new(0),
        }
    }
}

impl FakeState {
    pub fn set_story_reply(&self, reply: StoryReply) {
        *self.story_reply.lock().unwrap() = reply;
    }

    pub fn set_image_mode(&self, mode: ImageMode) {
        *self.image_mode.lock().unwrap() = mode;
    }

    pub fn set_image_delay(&self, delay: Duration) {
        *self.image_delay.lock().unwrap() = delay;
    }

    pub fn fail_prompts_containing(&self, marker: &str) {
        self.failing_prompts.lock().unwrap().push(marker.to_string());
    }

    pub fn set_image_host(&self, host: &str) {
        *self.image_host.lock().unwrap() = host.to_string();
    }

    pub fn set_save_status(&self, status: u16) {
        *self.save_status.lock().unwrap() = status;
    }

    pub fn set_history(&self, history: Value) {
        *self.history.lock().unwrap() = history;
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn prediction_count(&self) -> usize {
        self.prediction_requests.lock().unwrap().len()
    }

    fn next_image_url(&self) -> String {
        let n = self.images.fetch_add(1, Ordering::SeqCst);
        format!(
            "https://{}/fake/out-{}.webp",
            self.image_host.lock().unwrap(),
            n
        )
    }
}

/// The comic the fake story model writes for a user prompt
pub fn echo_comic(user_prompt: &str) -> Value {
    json!({
        "comics": (1..=3)
            .map(|i| json!({
                "prompt": format!("SNOWBUNNY scene {} of {}, cartoon style", i, user_prompt),
                "caption": format!("Snow, part {}: {}", i, user_prompt),
            }))
            .collect::<Vec<_>>()
    })
}

/// Fake chat, predictions and persistence services on a random port
pub struct FakeUpstream {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
    _handle: JoinHandle<()>,
}

impl FakeUpstream {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(FakeState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        *state.addr.lock().unwrap() = Some(addr);

        let router = Router::new()
            .route("/chat/completions", post(chat_completions))
            .route("/predictions", post(create_prediction))
            .route(
                "/models/{owner}/{name}/predictions",
                post(create_model_prediction),
            )
            .route("/predictions/{id}", get(get_prediction))
            .route("/save", post(save))
            .route("/history", get(history))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                eprintln!("Fake upstream error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

fn record_auth(state: &FakeState, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.auth_headers.lock().unwrap().push(auth);
}

async fn chat_completions(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record_auth(&state, &headers);
    state.chat_requests.lock().unwrap().push(body.clone());

    let user_prompt = body["messages"][1]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let reply = state.story_reply.lock().unwrap().clone();
    let content = match reply {
        StoryReply::Echo => Value::String(echo_comic(&user_prompt).to_string()),
        StoryReply::Content(Some(text)) => Value::String(text),
        StoryReply::Content(None) => Value::Null,
        StoryReply::NoChoices => {
            return (StatusCode::OK, Json(json!({"choices": []})));
        }
        StoryReply::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap();
            return (status, Json(json!({"error": {"message": "upstream down"}})));
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })),
    )
}

async fn create_prediction(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    run_prediction(state, headers, "/predictions".to_string(), body).await
}

async fn create_model_prediction(
    State(state): State<Arc<FakeState>>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let path = format!("/models/{}/{}/predictions", owner, name);
    run_prediction(state, headers, path, body).await
}

async fn run_prediction(
    state: Arc<FakeState>,
    headers: HeaderMap,
    path: String,
    body: Value,
) -> Json<Value> {
    record_auth(&state, &headers);
    state
        .prediction_requests
        .lock()
        .unwrap()
        .push((path, body.clone()));

    let delay = *state.image_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let id = format!("pred-{}", state.prediction_count());
    let prompt = body["input"]["prompt"].as_str().unwrap_or_default();
    let fails = state
        .failing_prompts
        .lock()
        .unwrap()
        .iter()
        .any(|marker| prompt.contains(marker.as_str()));

    if fails {
        return Json(json!({
            "id": id,
            "status": "failed",
            "output": null,
            "error": "prediction failed",
        }));
    }

    let mode = state.image_mode.lock().unwrap().clone();
    match mode {
        ImageMode::Immediate => Json(json!({
            "id": id,
            "status": "succeeded",
            "output": [state.next_image_url()],
        })),
        ImageMode::Polled(_) => {
            let addr = state.addr.lock().unwrap().unwrap();
            Json(json!({
                "id": id,
                "status": "starting",
                "output": null,
                "urls": {"get": format!("http://{}/predictions/{}", addr, id)},
            }))
        }
    }
}

async fn get_prediction(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    let polls = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
    let needed = match *state.image_mode.lock().unwrap() {
        ImageMode::Polled(n) => n,
        ImageMode::Immediate => 0,
    };
    let addr = state.addr.lock().unwrap().unwrap();

    if polls < needed {
        Json(json!({
            "id": id,
            "status": "processing",
            "output": null,
            "urls": {"get": format!("http://{}/predictions/{}", addr, id)},
        }))
    } else {
        Json(json!({
            "id": id,
            "status": "succeeded",
            "output": state.next_image_url(),
        }))
    }
}

async fn save(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> impl IntoResponse {
    state.saves.lock().unwrap().push(body);
    let status = StatusCode::from_u16(*state.save_status.lock().unwrap()).unwrap();
    (status, Json(json!({"ok": status.is_success()})))
}

async fn history(State(state): State<Arc<FakeState>>) -> Json<Value> {
    Json(state.history.lock().unwrap().clone())
}

/// Test harness that runs a real comicd server against a fake upstream
pub struct ComicTest {
    pub addr: SocketAddr,
    pub client: Client,
    pub upstream: FakeUpstream,
    pub config: Config,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl ComicTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Start a test server after adjusting its config
    pub async fn start_with(adjust: impl FnOnce(&mut Config)) -> Result<Self> {
        let upstream = FakeUpstream::start().await?;

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let mut config = Config::default();
        config.bind_addr = addr;
        config.story.base_url = upstream.base_url();
        config.story.api_key = Some("test-story-key".to_string());
        config.image.base_url = upstream.base_url();
        config.image.api_token = Some("test-image-token".to_string());
        config.image.poll_interval_ms = 10;
        config.image.max_wait_secs = 5;
        config.persistence.base_url = upstream.base_url();
        config.client.server_url = format!("http://{}", addr);
        config.client.timeout_secs = 10;
        adjust(&mut config);

        let server = Arc::new(Server::new(config.clone()).await?);
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            upstream,
            config,
            server,
            _handle: handle,
        })
    }

    /// Scriptable upstream state
    pub fn fake(&self) -> &FakeState {
        &self.upstream.state
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// A client board wired to this server and the fake persistence service
    pub fn board(&self) -> Board {
        let api = ApiClient::new(&self.config.client).expect("api client");
        let persistence = PersistenceClient::new(&self.config.persistence).expect("persistence");
        Board::new(api, persistence, self.config.client.image_hosts.clone())
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for ComicTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
