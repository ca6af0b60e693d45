//! In-memory stand-in for the Telegram Bot API.
//!
//! Serves `POST /bot{token}/{method}` with the same `ok/result` envelope as
//! the real service. Requests may be form-encoded or multipart. Every
//! authorized call is recorded so tests can assert on exactly what the
//! client sent, and failures can be scripted per method.

mod methods;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, warn};

/// Token accepted by `app()` and `run()`.
pub const DEFAULT_TOKEN: &str = "123456:mock-token";

/// One call as received by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub multipart: bool,
    pub fields: BTreeMap<String, String>,
    pub files: BTreeMap<String, UploadedFile>,
}

impl RecordedRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// A scripted failure for the next call of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A non-JSON proxy error page with status 502.
    BadGateway,
    /// An `ok: false` envelope.
    Api {
        code: u16,
        description: String,
        retry_after: Option<i64>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct StoredFile {
    pub unique_id: String,
    pub size: i64,
    pub path: String,
}

#[derive(Debug, Default)]
pub(crate) struct MockData {
    pub requests: Vec<RecordedRequest>,
    pub failures: HashMap<String, VecDeque<Failure>>,
    pub updates: Vec<Value>,
    pub next_update_id: i64,
    pub next_message_id: i64,
    pub messages: HashMap<(i64, i64), Value>,
    pub files: HashMap<String, StoredFile>,
    pub webhook: Option<Value>,
    pub commands: HashMap<String, Value>,
}

pub(crate) struct Inner {
    token: String,
    pub data: RwLock<MockData>,
    pub new_updates: Notify,
}

pub(crate) type Shared = Arc<Inner>;

/// Handle to a mock server's state, shared with its router.
#[derive(Clone)]
pub struct MockServer {
    inner: Shared,
}

impl MockServer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token: token.into(),
                data: RwLock::new(MockData {
                    next_update_id: 1,
                    ..MockData::default()
                }),
                new_updates: Notify::new(),
            }),
        }
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn app(&self) -> Router {
        Router::new()
            .route("/{bot}/{method}", post(call))
            .with_state(self.inner.clone())
    }

    pub async fn serve(self, listener: TcpListener) -> Result<(), std::io::Error> {
        axum::serve(listener, self.app()).await
    }

    /// Queue an update, assigning the next `update_id`.
    pub async fn push_update(&self, mut payload: Value) -> i64 {
        let mut data = self.inner.data.write().await;
        let id = data.next_update_id;
        data.next_update_id += 1;
        payload["update_id"] = json!(id);
        data.updates.push(payload);
        drop(data);
        self.inner.new_updates.notify_waiters();
        id
    }

    /// Make the next call of `method` fail with `failure`.
    pub async fn fail_next(&self, method: &str, failure: Failure) {
        let mut data = self.inner.data.write().await;
        data.failures
            .entry(method.to_string())
            .or_default()
            .push_back(failure);
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.data.read().await.requests.clone()
    }

    pub async fn last_request(&self, method: &str) -> Option<RecordedRequest> {
        let data = self.inner.data.read().await;
        data.requests.iter().rev().find(|r| r.method == method).cloned()
    }

    pub async fn pending_updates(&self) -> usize {
        self.inner.data.read().await.updates.len()
    }
}

/// A fresh server accepting `DEFAULT_TOKEN`.
pub fn app() -> Router {
    MockServer::new(DEFAULT_TOKEN).app()
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    MockServer::new(DEFAULT_TOKEN).serve(listener).await
}

/// An error answered with an `ok: false` envelope.
#[derive(Debug)]
pub(crate) struct Reject {
    pub status: StatusCode,
    pub description: String,
    pub retry_after: Option<i64>,
}

impl Reject {
    pub fn bad_request(description: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            description: format!("Bad Request: {}", description.into()),
            retry_after: None,
        }
    }
}

impl IntoResponse for Reject {
    fn into_response(self) -> Response {
        let mut body = json!({
            "ok": false,
            "error_code": self.status.as_u16(),
            "description": self.description,
        });
        if let Some(secs) = self.retry_after {
            body["parameters"] = json!({ "retry_after": secs });
        }
        (self.status, Json(body)).into_response()
    }
}

async fn call(
    State(inner): State<Shared>,
    Path((bot, method)): Path<(String, String)>,
    request: Request,
) -> Response {
    if bot.strip_prefix("bot") != Some(inner.token.as_str()) {
        return Reject {
            status: StatusCode::UNAUTHORIZED,
            description: "Unauthorized".to_string(),
            retry_after: None,
        }
        .into_response();
    }

    let recorded = match read_request(&method, request).await {
        Ok(recorded) => recorded,
        Err(message) => return Reject::bad_request(message).into_response(),
    };
    debug!(method = %method, fields = ?recorded.fields, files = recorded.files.len(), "call");

    let failure = {
        let mut data = inner.data.write().await;
        data.requests.push(recorded.clone());
        data.failures
            .get_mut(&method)
            .and_then(VecDeque::pop_front)
    };
    match failure {
        Some(Failure::BadGateway) => {
            warn!(method = %method, "scripted bad gateway");
            return (
                StatusCode::BAD_GATEWAY,
                Html("<html><body>502 Bad Gateway</body></html>"),
            )
                .into_response();
        }
        Some(Failure::Api {
            code,
            description,
            retry_after,
        }) => {
            warn!(method = %method, code, "scripted API error");
            return Reject {
                status: StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST),
                description,
                retry_after,
            }
            .into_response();
        }
        None => {}
    }

    match methods::dispatch(&inner, &recorded).await {
        Ok(result) => Json(json!({ "ok": true, "result": result })).into_response(),
        Err(reject) => reject.into_response(),
    }
}

async fn read_request(method: &str, request: Request) -> Result<RecordedRequest, String> {
    let multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));
    let mut recorded = RecordedRequest {
        method: method.to_string(),
        multipart,
        ..RecordedRequest::default()
    };

    if !multipart {
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        recorded.fields = url::form_urlencoded::parse(&body).into_owned().collect();
        return Ok(recorded);
    }

    let mut form = Multipart::from_request(request, &())
        .await
        .map_err(|e| e.body_text())?;
    while let Some(field) = form.next_field().await.map_err(|e| e.body_text())? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content = field.bytes().await.map_err(|e| e.body_text())?;
                recorded.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        content: content.to_vec(),
                    },
                );
            }
            None => {
                let value = field.text().await.map_err(|e| e.body_text())?;
                recorded.fields.insert(name, value);
            }
        }
    }
    Ok(recorded)
}
