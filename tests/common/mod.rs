#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use ledgerpay_http::{Cancellation, Wait};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
pub struct MockResponse {
    status: StatusCode,
    body: JsonValue,
    headers: Vec<(&'static str, String)>,
    delay: Duration,
}

impl MockResponse {
    pub fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
            delay: Duration::from_millis(0),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    hits: Arc<AtomicUsize>,
}

async fn api_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .seen
        .lock()
        .expect("seen mutex must not be poisoned")
        .push(SeenRequest {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            headers,
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"errors": {"message": "no mock response available"}}),
            )
            .with_header("x-should-retry", "false")
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let mut headers = HeaderMap::new();
    for (name, value) in response.headers {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(&value).expect("mock header must be valid"),
        );
    }
    (response.status, headers, Json(response.body))
}

pub struct TestServer {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl TestServer {
    pub fn api_url(&self) -> String {
        format!("{}/api", self.base_url)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("seen mutex").clone()
    }
}

fn router(responses: Vec<MockResponse>) -> (Router, MockState) {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        seen: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };
    let app = Router::new()
        .fallback(api_handler)
        .with_state(state.clone());
    (app, state)
}

/// Serves on the current tokio runtime.
pub async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let (app, state) = router(responses);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        seen: state.seen,
        task: Some(task),
    }
}

/// Serves from a dedicated thread with its own runtime, for blocking clients.
pub fn spawn_server_thread(responses: Vec<MockResponse>) -> TestServer {
    let (app, state) = router(responses);
    let (address_tx, address_rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("must build server runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("must bind test listener");
            address_tx
                .send(listener.local_addr().expect("must have local addr"))
                .expect("test must wait for address");
            axum::serve(listener, app)
                .await
                .expect("mock server must run");
        });
    });

    let address = address_rx.recv().expect("server must report address");
    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        seen: state.seen,
        task: None,
    }
}

/// Skips backoff entirely.
pub struct NoWait;

#[async_trait]
impl Wait for NoWait {
    async fn wait(
        &self,
        _delay: Duration,
        _cancellation: Option<&Cancellation>,
    ) -> ledgerpay_http::Result<()> {
        Ok(())
    }
}

/// Records requested delays without sleeping.
#[derive(Default)]
pub struct RecordingWait {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Wait for RecordingWait {
    async fn wait(
        &self,
        delay: Duration,
        _cancellation: Option<&Cancellation>,
    ) -> ledgerpay_http::Result<()> {
        self.delays.lock().expect("delays mutex").push(delay);
        Ok(())
    }
}
