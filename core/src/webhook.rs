//! Receiving updates over an HTTP webhook.
//!
//! # Design
//! Decoding is a plain function over a method and a body so any server can
//! use it. The axum helpers build on it: `listen_for_webhook` mounts a route
//! on a router the caller owns and hands back the receiving end of a bounded
//! channel, and `handle_single` serves one request without a channel.
//!
//! `webhook_reply` covers the opposite direction: a method call returned as
//! the body of the webhook response instead of a separate request.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::configs::ApiMethod;
use crate::error::{Error, ErrorKind, MethodContext, Result};
use crate::files;
use crate::http::FORM_CONTENT_TYPE;
use crate::types::Update;

/// Method name attached to errors raised while receiving updates.
const WEBHOOK: &str = "webhook";

/// Decode one webhook delivery.
pub fn decode_update(method: &Method, body: &[u8]) -> Result<Update> {
    if method != Method::POST {
        return Err(Error::new(
            WEBHOOK,
            ErrorKind::Misuse("wrong HTTP method, POST required".to_string()),
        ));
    }
    serde_json::from_slice(body).method_context(WEBHOOK)
}

/// Mount a webhook route at `path` on `router`.
///
/// Decoded updates are queued on the returned receiver, which holds at most
/// `buffer` of them; deliveries wait while it is full. A `path` without a
/// leading `/` is rejected.
///
/// # Panics
///
/// Panics if `router` already has a route at `path`, as `Router::merge` does.
pub fn listen_for_webhook<S>(
    router: Router<S>,
    path: &str,
    buffer: usize,
) -> Result<(Router<S>, mpsc::Receiver<Update>)>
where
    S: Clone + Send + Sync + 'static,
{
    if !path.starts_with('/') {
        return Err(Error::new(
            WEBHOOK,
            ErrorKind::Misuse(format!("webhook path {path:?} must start with '/'")),
        ));
    }
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let webhook: Router<S> = Router::new()
        .route(path, any(receive_update))
        .with_state(tx);
    info!(path, "listening for webhook updates");
    Ok((router.merge(webhook), rx))
}

async fn receive_update(
    State(tx): State<mpsc::Sender<Update>>,
    method: Method,
    body: Bytes,
) -> Response {
    let (response, update) = handle_single(&method, &body);
    if let Some(update) = update {
        if tx.send(update).await.is_err() {
            warn!("webhook receiver dropped, discarding update");
        }
    }
    response
}

/// Serve one delivery: the response to write back and the update, if any.
pub fn handle_single(method: &Method, body: &[u8]) -> (Response, Option<Update>) {
    match decode_update(method, body) {
        Ok(update) => (StatusCode::OK.into_response(), Some(update)),
        Err(err) => {
            warn!(error = %err, "rejected webhook delivery");
            (error_response(&err), None)
        }
    }
}

fn error_response(err: &Error) -> Response {
    // A bad body is the sender's update, not an API envelope.
    let message = match err.kind() {
        ErrorKind::Decode(inner) => inner.to_string(),
        kind => kind.to_string(),
    };
    let body = serde_json::json!({ "error": message });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Render `config` as a webhook response body that performs the call.
pub fn webhook_reply<M: ApiMethod + ?Sized>(config: &M) -> Result<Response> {
    let method = config.method();
    let files = config.files();
    if files::needs_upload(&files) {
        return Err(Error::new(
            method,
            ErrorKind::Misuse("unable to use http response to upload files".to_string()),
        ));
    }

    let mut params = config.params().method_context(method)?;
    for file in &files {
        if let Some(value) = file.data.send_data() {
            params.insert(file.name.as_str(), value);
        }
    }
    params.insert("method", method);

    Ok(([(CONTENT_TYPE, FORM_CONTENT_TYPE)], params.encode_form()).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::{MessageConfig, PhotoConfig};
    use crate::files::RequestFileData;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const UPDATE: &str = r#"{"update_id":10,"message":{"message_id":1,"date":0,"chat":{"id":5,"type":"private"},"text":"hi"}}"#;

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn decode_requires_post() {
        let err = decode_update(&Method::GET, UPDATE.as_bytes()).unwrap_err();
        assert_eq!(err.method(), "webhook");
        assert_eq!(err.kind().to_string(), "wrong HTTP method, POST required");
    }

    #[test]
    fn decode_reads_update() {
        let update = decode_update(&Method::POST, UPDATE.as_bytes()).unwrap();
        assert_eq!(update.update_id, 10);
        assert_eq!(update.message.unwrap().text.as_deref(), Some("hi"));
    }

    #[test]
    fn decode_error_is_returned() {
        let err = decode_update(&Method::POST, b"{not json").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Decode(_)));
    }

    #[tokio::test]
    async fn route_queues_updates() {
        let (app, mut rx) = listen_for_webhook(Router::new(), "/hook", 4).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/hook")
                    .header("content-type", "application/json")
                    .body(Body::from(UPDATE))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().update_id, 10);
    }

    #[tokio::test]
    async fn route_rejects_get_with_json_error() {
        let (app, mut rx) = listen_for_webhook(Router::new(), "/hook", 4).unwrap();

        let response = app
            .oneshot(Request::builder().uri("/hook").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "wrong HTTP method, POST required");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn existing_routes_are_kept() {
        let router = Router::new().route("/health", axum::routing::get(|| async { "ok" }));
        let (app, _rx) = listen_for_webhook(router, "/hook", 1).unwrap();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }

    #[test]
    fn path_must_be_absolute() {
        let err = listen_for_webhook(Router::<()>::new(), "hook", 1).unwrap_err();
        assert_eq!(err.method(), "webhook");
        assert!(matches!(err.kind(), ErrorKind::Misuse(_)));
    }

    #[tokio::test]
    async fn handle_single_reports_bad_body() {
        let (response, update) = handle_single(&Method::POST, b"[]");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(update.is_none());

        let expected = serde_json::from_slice::<Update>(b"[]").unwrap_err().to_string();
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], expected.as_str());
    }

    #[tokio::test]
    async fn reply_carries_method_field() {
        let response = webhook_reply(&MessageConfig::new(5, "pong")).unwrap();
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            body_string(response).await,
            "chat_id=5&method=sendMessage&text=pong"
        );
    }

    #[tokio::test]
    async fn reply_inlines_file_references() {
        let config = PhotoConfig::new(5, RequestFileData::file_id("AgAD"));
        let body = body_string(webhook_reply(&config).unwrap()).await;
        assert_eq!(body, "chat_id=5&method=sendPhoto&photo=AgAD");
    }

    #[test]
    fn reply_rejects_uploads() {
        let config = PhotoConfig::new(5, RequestFileData::bytes("a.png", vec![1, 2]));
        let err = webhook_reply(&config).unwrap_err();
        assert_eq!(err.method(), "sendPhoto");
        assert_eq!(
            err.kind().to_string(),
            "unable to use http response to upload files"
        );
    }
}
