//! Per-method behavior of the mock API.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{Inner, MockData, RecordedRequest, Reject, StoredFile};

type Outcome = Result<Value, Reject>;

const CHANNEL_CHAT_ID: i64 = -1_001_000_000_001;

pub(crate) async fn dispatch(inner: &Inner, req: &RecordedRequest) -> Outcome {
    if req.method == "getUpdates" {
        return get_updates(inner, req).await;
    }

    let mut data = inner.data.write().await;
    match req.method.as_str() {
        "getMe" => Ok(bot_user()),
        "sendMessage" => send_message(&mut data, req),
        "sendLocation" => send_location(&mut data, req),
        "sendPhoto" => send_photo(&mut data, req),
        "sendDocument" => send_document(&mut data, req),
        "editMessageText" => edit_message_text(&mut data, req),
        "stopPoll" => stop_poll(&data, req),
        "setWebhook" => set_webhook(&mut data, req),
        "deleteWebhook" => delete_webhook(&mut data, req),
        "getWebhookInfo" => Ok(webhook_info(&data)),
        "setMyCommands" => set_my_commands(&mut data, req),
        "getMyCommands" => get_my_commands(&data, req),
        "deleteMyCommands" => delete_my_commands(&mut data, req),
        "getFile" => get_file(&data, req),
        _ => Err(Reject {
            status: StatusCode::NOT_FOUND,
            description: "Not Found".to_string(),
            retry_after: None,
        }),
    }
}

fn bot_user() -> Value {
    json!({
        "id": 1,
        "is_bot": true,
        "first_name": "Mock Bot",
        "username": "mock_bot",
    })
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

// --- field helpers ---

fn required<'a>(req: &'a RecordedRequest, name: &str) -> Result<&'a str, Reject> {
    match req.field(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Reject::bad_request(format!("{name} is empty"))),
    }
}

fn int(req: &RecordedRequest, name: &str) -> Result<Option<i64>, Reject> {
    req.field(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| Reject::bad_request(format!("{name} must be an integer")))
        })
        .transpose()
}

fn float(req: &RecordedRequest, name: &str) -> Result<f64, Reject> {
    required(req, name)?
        .parse()
        .map_err(|_| Reject::bad_request(format!("{name} must be a number")))
}

fn json_field(req: &RecordedRequest, name: &str) -> Result<Option<Value>, Reject> {
    req.field(name)
        .map(|value| {
            serde_json::from_str(value)
                .map_err(|_| Reject::bad_request(format!("can't parse {name} JSON object")))
        })
        .transpose()
}

fn flag(req: &RecordedRequest, name: &str) -> bool {
    req.field(name) == Some("true")
}

// --- messages ---

fn chat_for(target: &str) -> Result<Value, Reject> {
    if let Some(username) = target.strip_prefix('@') {
        return Ok(json!({
            "id": CHANNEL_CHAT_ID,
            "type": "channel",
            "title": username,
            "username": username,
        }));
    }
    let id: i64 = target
        .parse()
        .map_err(|_| Reject::bad_request("chat not found"))?;
    let kind = if id > 0 { "private" } else { "supergroup" };
    Ok(json!({ "id": id, "type": kind }))
}

/// Start a new outgoing message in the chat named by `chat_id`.
fn new_message(data: &mut MockData, req: &RecordedRequest) -> Result<Map<String, Value>, Reject> {
    let chat = chat_for(required(req, "chat_id")?)?;
    data.next_message_id += 1;

    let mut message = Map::new();
    message.insert("message_id".into(), json!(data.next_message_id));
    message.insert("from".into(), bot_user());
    message.insert("date".into(), json!(now()));

    if let Some(reply_to) = int(req, "reply_to_message_id")? {
        let chat_id = chat["id"].as_i64().unwrap_or_default();
        let original = match data.messages.get(&(chat_id, reply_to)) {
            Some(original) => original.clone(),
            None if flag(req, "allow_sending_without_reply") => Value::Null,
            None => json!({ "message_id": reply_to, "date": 0, "chat": chat.clone() }),
        };
        if !original.is_null() {
            message.insert("reply_to_message".into(), original);
        }
    }
    message.insert("chat".into(), chat);

    // Only inline keyboards are echoed back on a message.
    if let Some(markup) = json_field(req, "reply_markup")? {
        if markup.get("inline_keyboard").is_some() {
            message.insert("reply_markup".into(), markup);
        }
    }
    Ok(message)
}

fn store(data: &mut MockData, message: Map<String, Value>) -> Value {
    let message = Value::Object(message);
    let chat_id = message["chat"]["id"].as_i64().unwrap_or_default();
    let message_id = message["message_id"].as_i64().unwrap_or_default();
    data.messages.insert((chat_id, message_id), message.clone());
    message
}

fn send_message(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    let text = req
        .field("text")
        .filter(|text| !text.is_empty())
        .ok_or_else(|| Reject::bad_request("message text is empty"))?
        .to_string();
    let mut message = new_message(data, req)?;
    message.insert("text".into(), json!(text));
    if let Some(entities) = json_field(req, "entities")? {
        message.insert("entities".into(), entities);
    }
    Ok(store(data, message))
}

fn send_location(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    let latitude = float(req, "latitude")?;
    let longitude = float(req, "longitude")?;
    let mut location = json!({ "latitude": latitude, "longitude": longitude });
    if let Some(secs) = int(req, "live_period")? {
        location["live_period"] = json!(secs);
    }

    let mut message = new_message(data, req)?;
    message.insert("location".into(), location);
    Ok(store(data, message))
}

/// Resolve a file field: an upload registers a new file, text names an existing one.
fn resolve_file(
    data: &mut MockData,
    req: &RecordedRequest,
    field: &str,
    folder: &str,
) -> Result<(String, StoredFile, Option<String>), Reject> {
    if let Some(upload) = req.files.get(field) {
        let file_id = format!("file-{}", Uuid::new_v4().simple());
        let stored = StoredFile {
            unique_id: format!("u{}", data.files.len() + 1),
            size: upload.content.len() as i64,
            path: format!("{folder}/{}", upload.file_name),
        };
        data.files.insert(file_id.clone(), stored.clone());
        return Ok((file_id, stored, Some(upload.file_name.clone())));
    }

    let reference = required(req, field)?;
    if let Some(stored) = data.files.get(reference) {
        return Ok((reference.to_string(), stored.clone(), None));
    }
    if reference.starts_with("http://") || reference.starts_with("https://") {
        let file_id = format!("file-{}", Uuid::new_v4().simple());
        let name = reference.rsplit('/').next().unwrap_or("remote");
        let stored = StoredFile {
            unique_id: format!("u{}", data.files.len() + 1),
            size: 0,
            path: format!("{folder}/{name}"),
        };
        data.files.insert(file_id.clone(), stored.clone());
        return Ok((file_id, stored, Some(name.to_string())));
    }
    Err(Reject::bad_request("wrong file identifier/HTTP URL specified"))
}

fn send_photo(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    let (file_id, stored, _) = resolve_file(data, req, "photo", "photos")?;
    let mut message = new_message(data, req)?;
    message.insert(
        "photo".into(),
        json!([{
            "file_id": file_id,
            "file_unique_id": stored.unique_id,
            "width": 90,
            "height": 90,
            "file_size": stored.size,
        }]),
    );
    if let Some(caption) = req.field("caption") {
        message.insert("caption".into(), json!(caption));
    }
    Ok(store(data, message))
}

fn send_document(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    let (file_id, stored, file_name) = resolve_file(data, req, "document", "documents")?;
    let mut message = new_message(data, req)?;
    let mut document = json!({
        "file_id": file_id,
        "file_unique_id": stored.unique_id,
        "file_size": stored.size,
    });
    if let Some(name) = file_name {
        document["file_name"] = json!(name);
    }
    message.insert("document".into(), document);
    if let Some(caption) = req.field("caption") {
        message.insert("caption".into(), json!(caption));
    }
    Ok(store(data, message))
}

fn edited_target(req: &RecordedRequest) -> Result<Option<(i64, i64)>, Reject> {
    if req.field("inline_message_id").is_some() {
        return Ok(None);
    }
    let chat = chat_for(required(req, "chat_id")?)?;
    let message_id = int(req, "message_id")?
        .ok_or_else(|| Reject::bad_request("message identifier is not specified"))?;
    Ok(Some((chat["id"].as_i64().unwrap_or_default(), message_id)))
}

fn edit_message_text(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    let text = required(req, "text")?.to_string();
    let Some(key) = edited_target(req)? else {
        // Inline messages are not returned, only acknowledged.
        return Ok(json!(true));
    };
    let markup = json_field(req, "reply_markup")?;
    let message = data
        .messages
        .get_mut(&key)
        .ok_or_else(|| Reject::bad_request("message to edit not found"))?;
    message["text"] = json!(text);
    message["edit_date"] = json!(now());
    if let Some(markup) = markup {
        message["reply_markup"] = markup;
    }
    Ok(message.clone())
}

fn stop_poll(data: &MockData, req: &RecordedRequest) -> Outcome {
    let key = edited_target(req)?
        .ok_or_else(|| Reject::bad_request("message identifier is not specified"))?;
    let message = data
        .messages
        .get(&key)
        .ok_or_else(|| Reject::bad_request("message with poll to stop not found"))?;
    let mut poll = message.get("poll").cloned().unwrap_or_else(|| {
        json!({
            "id": format!("poll-{}-{}", key.0, key.1),
            "question": message.get("text").cloned().unwrap_or(json!("")),
            "options": [],
            "total_voter_count": 0,
        })
    });
    poll["is_closed"] = json!(true);
    Ok(poll)
}

// --- updates ---

async fn get_updates(inner: &Inner, req: &RecordedRequest) -> Outcome {
    let offset = int(req, "offset")?.unwrap_or(0);
    let limit = int(req, "limit")?.unwrap_or(100).clamp(1, 100) as usize;
    let timeout = int(req, "timeout")?.unwrap_or(0).max(0) as u64;

    let notified = inner.new_updates.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();

    let batch = take_updates(inner, offset, limit).await?;
    if !batch.is_empty() || timeout == 0 {
        return Ok(Value::Array(batch));
    }
    let _ = tokio::time::timeout(Duration::from_secs(timeout), notified).await;
    Ok(Value::Array(take_updates(inner, offset, limit).await?))
}

/// Confirm updates below `offset`, then return up to `limit` pending ones.
async fn take_updates(inner: &Inner, offset: i64, limit: usize) -> Result<Vec<Value>, Reject> {
    let mut data = inner.data.write().await;
    if data.webhook.is_some() {
        return Err(Reject {
            status: StatusCode::CONFLICT,
            description: "Conflict: can't use getUpdates method while webhook is active"
                .to_string(),
            retry_after: None,
        });
    }
    if offset > 0 {
        data.updates
            .retain(|update| update["update_id"].as_i64().unwrap_or_default() >= offset);
    }
    Ok(data.updates.iter().take(limit).cloned().collect())
}

// --- webhooks ---

fn set_webhook(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    let url = req.field("url").unwrap_or_default();
    if url.is_empty() {
        data.webhook = None;
        return Ok(json!(true));
    }
    if !url.starts_with("https://") {
        return Err(Reject::bad_request("bad webhook: HTTPS url must be provided for webhook"));
    }

    let mut info = json!({
        "url": url,
        "has_custom_certificate": req.files.contains_key("certificate"),
    });
    if let Some(max) = int(req, "max_connections")? {
        info["max_connections"] = json!(max);
    }
    if let Some(allowed) = json_field(req, "allowed_updates")? {
        info["allowed_updates"] = allowed;
    }
    if let Some(ip) = req.field("ip_address") {
        info["ip_address"] = json!(ip);
    }
    if flag(req, "drop_pending_updates") {
        data.updates.clear();
    }
    data.webhook = Some(info);
    Ok(json!(true))
}

fn delete_webhook(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    data.webhook = None;
    if flag(req, "drop_pending_updates") {
        data.updates.clear();
    }
    Ok(json!(true))
}

fn webhook_info(data: &MockData) -> Value {
    let mut info = data
        .webhook
        .clone()
        .unwrap_or_else(|| json!({ "url": "", "has_custom_certificate": false }));
    info["pending_update_count"] = json!(data.updates.len());
    info
}

// --- commands ---

/// Commands are stored per scope and language.
fn commands_key(req: &RecordedRequest) -> Result<String, Reject> {
    let scope = json_field(req, "scope")?.unwrap_or_else(|| json!({ "type": "default" }));
    let language = req.field("language_code").unwrap_or_default();
    Ok(format!("{scope}|{language}"))
}

fn set_my_commands(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    let commands = json_field(req, "commands")?
        .ok_or_else(|| Reject::bad_request("parameter \"commands\" is required"))?;
    if !commands.is_array() {
        return Err(Reject::bad_request("commands must be an array"));
    }
    data.commands.insert(commands_key(req)?, commands);
    Ok(json!(true))
}

fn get_my_commands(data: &MockData, req: &RecordedRequest) -> Outcome {
    let key = commands_key(req)?;
    Ok(data.commands.get(&key).cloned().unwrap_or_else(|| json!([])))
}

fn delete_my_commands(data: &mut MockData, req: &RecordedRequest) -> Outcome {
    data.commands.remove(&commands_key(req)?);
    Ok(json!(true))
}

// --- files ---

fn get_file(data: &MockData, req: &RecordedRequest) -> Outcome {
    let file_id = required(req, "file_id")?;
    let stored = data
        .files
        .get(file_id)
        .ok_or_else(|| Reject::bad_request("invalid file_id"))?;
    Ok(json!({
        "file_id": file_id,
        "file_unique_id": stored.unique_id,
        "file_size": stored.size,
        "file_path": stored.path,
    }))
}
