use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Failure, MockServer, DEFAULT_TOKEN};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn form_request(method: &str, fields: &[(&str, &str)]) -> Request<String> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    Request::builder()
        .method("POST")
        .uri(format!("/bot{DEFAULT_TOKEN}/{method}"))
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body)
        .unwrap()
}

async fn call(server: &MockServer, method: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
    let resp = server
        .app()
        .oneshot(form_request(method, fields))
        .await
        .unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

fn server() -> MockServer {
    MockServer::new(DEFAULT_TOKEN)
}

// --- envelope ---

#[tokio::test]
async fn get_me_returns_bot_user() {
    let resp = app().oneshot(form_request("getMe", &[])).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["result"]["is_bot"], true);
    assert_eq!(body["result"]["username"], "mock_bot");
}

#[tokio::test]
async fn wrong_token_returns_401_envelope() {
    let req = Request::builder()
        .method("POST")
        .uri("/bot1:wrong/getMe")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error_code"], 401);
    assert_eq!(body["description"], "Unauthorized");
}

#[tokio::test]
async fn unknown_method_returns_404_envelope() {
    let (status, body) = call(&server(), "sendTelepathy", &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], 404);
}

// --- messages ---

#[tokio::test]
async fn send_message_echoes_fields_and_records_request() {
    let server = server();
    let (status, body) = call(
        &server,
        "sendMessage",
        &[
            ("chat_id", "42"),
            ("text", "hello"),
            ("entities", r#"[{"type":"bold","offset":0,"length":5}]"#),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let message = &body["result"];
    assert_eq!(message["chat"]["id"], 42);
    assert_eq!(message["text"], "hello");
    assert_eq!(message["entities"][0]["type"], "bold");

    let recorded = server.last_request("sendMessage").await.unwrap();
    assert!(!recorded.multipart);
    assert_eq!(recorded.field("chat_id"), Some("42"));
}

#[tokio::test]
async fn send_message_without_text_is_rejected() {
    let (status, body) = call(&server(), "sendMessage", &[("chat_id", "42")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["description"], "Bad Request: message text is empty");
}

#[tokio::test]
async fn edit_message_text_updates_stored_message() {
    let server = server();
    let (_, sent) = call(&server, "sendMessage", &[("chat_id", "7"), ("text", "v1")]).await;
    let message_id = sent["result"]["message_id"].to_string();

    let (status, body) = call(
        &server,
        "editMessageText",
        &[("chat_id", "7"), ("message_id", message_id.as_str()), ("text", "v2")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["text"], "v2");
    assert!(body["result"]["edit_date"].is_i64());

    let (status, _) = call(
        &server,
        "editMessageText",
        &[("chat_id", "7"), ("message_id", "999"), ("text", "v3")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// --- files ---

#[tokio::test]
async fn multipart_photo_upload_registers_file() {
    let server = server();
    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"chat_id\"\r\n\r\n\
        7\r\n\
        --XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"photo\"; filename=\"cat.png\"\r\n\
        Content-Type: application/octet-stream\r\n\r\n\
        PNGDATA\r\n\
        --XBOUNDARY--\r\n";
    let req = Request::builder()
        .method("POST")
        .uri(format!("/bot{DEFAULT_TOKEN}/sendPhoto"))
        .header(
            http::header::CONTENT_TYPE,
            "multipart/form-data; boundary=XBOUNDARY",
        )
        .body(body.to_string())
        .unwrap();
    let resp = server.app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let photo = &body["result"]["photo"][0];
    assert_eq!(photo["file_size"], 7);

    let recorded = server.last_request("sendPhoto").await.unwrap();
    assert!(recorded.multipart);
    assert_eq!(recorded.files["photo"].file_name, "cat.png");
    assert_eq!(recorded.files["photo"].content, b"PNGDATA");

    let file_id = photo["file_id"].as_str().unwrap();
    let (status, body) = call(&server, "getFile", &[("file_id", file_id)]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["file_path"], "photos/cat.png");
}

#[tokio::test]
async fn unknown_file_id_is_rejected() {
    let (status, body) = call(&server(), "getFile", &[("file_id", "nope")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["description"], "Bad Request: invalid file_id");
}

// --- updates ---

#[tokio::test]
async fn get_updates_confirms_below_offset() {
    let server = server();
    for text in ["a", "b", "c"] {
        server
            .push_update(json!({ "message": { "message_id": 1, "date": 0, "chat": { "id": 1, "type": "private" }, "text": text } }))
            .await;
    }

    let (_, body) = call(&server, "getUpdates", &[("offset", "2")]).await;
    let ids: Vec<_> = body["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["update_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(server.pending_updates().await, 2);

    let (_, body) = call(&server, "getUpdates", &[("offset", "2"), ("limit", "1")]).await;
    assert_eq!(body["result"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn scripted_failures_apply_once() {
    let server = server();
    server.fail_next("getUpdates", Failure::BadGateway).await;
    server
        .fail_next(
            "getUpdates",
            Failure::Api {
                code: 429,
                description: "Too Many Requests: retry after 1".to_string(),
                retry_after: Some(1),
            },
        )
        .await;

    let resp = server
        .app()
        .oneshot(form_request("getUpdates", &[]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(body_bytes(resp).await.starts_with(b"<html>"));

    let (status, body) = call(&server, "getUpdates", &[]).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["parameters"]["retry_after"], 1);

    let (status, body) = call(&server, "getUpdates", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!([]));
}

// --- webhooks ---

#[tokio::test]
async fn webhook_lifecycle() {
    let server = server();
    let (status, _) = call(
        &server,
        "setWebhook",
        &[("url", "https://example.com/hook"), ("max_connections", "5")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, info) = call(&server, "getWebhookInfo", &[]).await;
    assert_eq!(info["result"]["url"], "https://example.com/hook");
    assert_eq!(info["result"]["max_connections"], 5);

    let (status, _) = call(&server, "getUpdates", &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&server, "deleteWebhook", &[]).await;
    let (_, info) = call(&server, "getWebhookInfo", &[]).await;
    assert_eq!(info["result"]["url"], "");
}

#[tokio::test]
async fn plain_http_webhook_is_rejected() {
    let (status, _) = call(&server(), "setWebhook", &[("url", "http://example.com/hook")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// --- commands ---

#[tokio::test]
async fn commands_are_stored_per_scope() {
    let server = server();
    let scope = r#"{"type":"chat","chat_id":9}"#;
    call(
        &server,
        "setMyCommands",
        &[
            ("commands", r#"[{"command":"start","description":"Start"}]"#),
            ("scope", scope),
        ],
    )
    .await;

    let (_, body) = call(&server, "getMyCommands", &[("scope", scope)]).await;
    assert_eq!(body["result"][0]["command"], "start");
    let (_, body) = call(&server, "getMyCommands", &[]).await;
    assert_eq!(body["result"], json!([]));

    call(&server, "deleteMyCommands", &[("scope", scope)]).await;
    let (_, body) = call(&server, "getMyCommands", &[("scope", scope)]).await;
    assert_eq!(body["result"], json!([]));
}
