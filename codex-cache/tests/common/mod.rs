//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Router,
};
use codex_cache::{CodexError, FetchOptions, FetchResult, Reference, Result, StorageProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

/// Canned response for one path
#[derive(Debug, Clone)]
pub struct Route {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

/// HTTP server on an ephemeral port serving canned routes by path
#[derive(Clone, Default)]
pub struct FileServer {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pub base_url: String,
}

impl FileServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = FileServer {
            base_url: format!("http://{}", addr),
            ..Default::default()
        };

        let app = Router::new()
            .fallback(handle)
            .with_state(server.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        server
    }

    pub fn route(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    pub fn serve(&self, path: &str, body: &str) {
        self.route(path, Route::ok(body.as_bytes().to_vec()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of GET requests for a path
    pub fn hits(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path == path && r.method == "GET")
            .count()
    }
}

async fn handle(State(server): State<FileServer>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    server.requests.lock().unwrap().push(RecordedRequest {
        method: request.method().to_string(),
        path: path.clone(),
        query: request.uri().query().map(str::to_string),
        authorization: request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let route = server
        .routes
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or_else(|| Route::status(StatusCode::NOT_FOUND));

    let mut response = Response::new(Body::from(route.body));
    *response.status_mut() = route.status;
    for (name, value) in route.headers {
        response.headers_mut().insert(
            header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(&value).unwrap(),
        );
    }
    response
}

/// Provider returning `"v1"`, `"v2"`, ... on successive fetches
///
/// A closed gate blocks fetches until [`ScriptedProvider::open`] is called.
pub struct ScriptedProvider {
    name: String,
    calls: AtomicUsize,
    failing: Mutex<Option<CodexError>>,
    gate: Semaphore,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, true)
    }

    pub fn gated(name: &str) -> Arc<Self> {
        Self::build(name, false)
    }

    fn build(name: &str, open: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            failing: Mutex::new(None),
            gate: Semaphore::new(if open { Semaphore::MAX_PERMITS } else { 0 }),
        })
    }

    pub fn open(&self) {
        self.gate.add_permits(1024);
    }

    pub fn fail_with(&self, err: CodexError) {
        *self.failing.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.failing.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn clone_error(err: &CodexError) -> CodexError {
    match err {
        CodexError::NotFound(m) => CodexError::NotFound(m.clone()),
        CodexError::Transport(m) => CodexError::Transport(m.clone()),
        CodexError::TooLarge { size, max_size } => CodexError::TooLarge {
            size: *size,
            max_size: *max_size,
        },
        other => CodexError::Transport(other.to_string()),
    }
}

#[async_trait]
impl StorageProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, _reference: &Reference) -> bool {
        true
    }

    async fn fetch(&self, _reference: &Reference, _options: &FetchOptions) -> Result<FetchResult> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| CodexError::Transport(e.to_string()))?;

        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self.failing.lock().unwrap().as_ref() {
            return Err(clone_error(err));
        }
        Ok(FetchResult::new(
            format!("v{}", n).into_bytes(),
            "text/markdown",
            self.name.clone(),
        ))
    }

    async fn exists(&self, _reference: &Reference, _options: &FetchOptions) -> bool {
        self.failing.lock().unwrap().is_none()
    }
}
