//! Bot API data types: updates, messages, keyboards and response envelopes.
//!
//! # Design
//! These mirror the remote JSON schema field for field. Only the subset the
//! client's methods need is modelled; unknown fields are ignored on decode.
//! Optional fields are skipped on encode so values re-serialize to the same
//! shape the API sends.

use serde::{Deserialize, Serialize};

/// Raw response envelope returned by every API method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ResponseParameters>,
}

/// Hints attached to a failed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_to_chat_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

/// An incoming event. Exactly one payload field is set per update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
}

impl Update {
    /// The user who caused the update, if any.
    pub fn sent_from(&self) -> Option<&User> {
        if let Some(query) = &self.callback_query {
            return Some(&query.from);
        }
        self.any_message().and_then(|msg| msg.from.as_ref())
    }

    /// The chat the update belongs to, if any.
    pub fn from_chat(&self) -> Option<&Chat> {
        if let Some(msg) = self.any_message() {
            return Some(&msg.chat);
        }
        self.callback_query
            .as_ref()
            .and_then(|query| query.message.as_ref())
            .map(|msg| &msg.chat)
    }

    pub fn callback_data(&self) -> Option<&str> {
        self.callback_query.as_ref()?.data.as_deref()
    }

    fn any_message(&self) -> Option<&Message> {
        self.message
            .as_ref()
            .or(self.edited_message.as_ref())
            .or(self.channel_post.as_ref())
            .or(self.edited_channel_post.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }

    pub fn is_group(&self) -> bool {
        self.kind == "group" || self.kind == "supergroup"
    }

    pub fn is_channel(&self) -> bool {
        self.kind == "channel"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_chat: Option<Chat>,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption_entities: Vec<MessageEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photo: Vec<PhotoSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl Message {
    /// True if the message starts with a `bot_command` entity.
    pub fn is_command(&self) -> bool {
        self.entities
            .first()
            .is_some_and(|entity| entity.offset == 0 && entity.is_command())
    }

    /// The command name without the leading slash or `@botname` suffix.
    pub fn command(&self) -> Option<&str> {
        let command = self.command_with_at()?;
        Some(command.split('@').next().unwrap_or(command))
    }

    /// The command name including any `@botname` suffix.
    pub fn command_with_at(&self) -> Option<&str> {
        if !self.is_command() {
            return None;
        }
        let entity = &self.entities[0];
        let text = self.text.as_deref()?;
        let end = utf16_to_byte_offset(text, entity.length)?;
        text.get(1..end)
    }

    /// Everything after the command, trimmed of the separating space.
    pub fn command_arguments(&self) -> Option<&str> {
        if !self.is_command() {
            return None;
        }
        let entity = &self.entities[0];
        let text = self.text.as_deref()?;
        let end = utf16_to_byte_offset(text, entity.length)?;
        Some(text.get(end..)?.trim_start())
    }
}

/// Entity offsets count UTF-16 code units.
fn utf16_to_byte_offset(text: &str, units: i64) -> Option<usize> {
    let units = usize::try_from(units).ok()?;
    let mut seen = 0;
    for (index, ch) in text.char_indices() {
        if seen >= units {
            return Some(index);
        }
        seen += ch.len_utf16();
    }
    (seen >= units).then_some(text.len())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: i64,
    pub length: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl MessageEntity {
    pub fn new(kind: impl Into<String>, offset: i64, length: i64) -> Self {
        Self {
            kind: kind.into(),
            offset,
            length,
            ..Self::default()
        }
    }

    pub fn is_command(&self) -> bool {
        self.kind == "bot_command"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: i64,
    pub height: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_period: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub total_voter_count: i64,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    pub voter_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
    #[serde(default)]
    pub chat_instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A file ready to be downloaded with `BotApi::file_url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookInfo {
    pub url: String,
    #[serde(default)]
    pub has_custom_certificate: bool,
    #[serde(default)]
    pub pending_update_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_updates: Vec<String>,
}

impl WebhookInfo {
    pub fn is_set(&self) -> bool {
        !self.url.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Which users a command list applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotCommandScope {
    Default,
    AllPrivateChats,
    AllGroupChats,
    AllChatAdministrators,
    Chat { chat_id: i64 },
    ChatAdministrators { chat_id: i64 },
    ChatMember { chat_id: i64, user_id: i64 },
}

// ---------------------------------------------------------------------------
// Keyboards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub request_location: bool,
}

impl KeyboardButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn contact(text: impl Into<String>) -> Self {
        Self {
            request_contact: true,
            ..Self::new(text)
        }
    }

    pub fn location(text: impl Into<String>) -> Self {
        Self {
            request_location: true,
            ..Self::new(text)
        }
    }
}

/// Collect buttons into one keyboard row.
pub fn keyboard_row<B>(buttons: impl IntoIterator<Item = B>) -> Vec<B> {
    buttons.into_iter().collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resize_keyboard: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub one_time_keyboard: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_field_placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selective: bool,
}

impl ReplyKeyboardMarkup {
    /// A keyboard that resizes to fit its buttons.
    pub fn new(rows: impl IntoIterator<Item = Vec<KeyboardButton>>) -> Self {
        Self {
            keyboard: rows.into_iter().collect(),
            resize_keyboard: true,
            ..Self::default()
        }
    }

    pub fn one_time(mut self) -> Self {
        self.one_time_keyboard = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selective: bool,
}

impl Default for ReplyKeyboardRemove {
    fn default() -> Self {
        Self {
            remove_keyboard: true,
            selective: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceReply {
    pub force_reply: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_field_placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selective: bool,
}

impl Default for ForceReply {
    fn default() -> Self {
        Self {
            force_reply: true,
            input_field_placeholder: None,
            selective: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_inline_query: Option<String>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    pub fn new(rows: impl IntoIterator<Item = Vec<InlineKeyboardButton>>) -> Self {
        Self {
            inline_keyboard: rows.into_iter().collect(),
        }
    }
}

/// Any of the markups a sent message can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
    ForceReply(ForceReply),
}

impl From<InlineKeyboardMarkup> for ReplyMarkup {
    fn from(markup: InlineKeyboardMarkup) -> Self {
        Self::Inline(markup)
    }
}

impl From<ReplyKeyboardMarkup> for ReplyMarkup {
    fn from(markup: ReplyKeyboardMarkup) -> Self {
        Self::Keyboard(markup)
    }
}

impl From<ReplyKeyboardRemove> for ReplyMarkup {
    fn from(markup: ReplyKeyboardRemove) -> Self {
        Self::Remove(markup)
    }
}

impl From<ForceReply> for ReplyMarkup {
    fn from(markup: ForceReply) -> Self {
        Self::ForceReply(markup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_message(text: &str, length: i64) -> Message {
        Message {
            message_id: 1,
            text: Some(text.to_string()),
            entities: vec![MessageEntity::new("bot_command", 0, length)],
            ..Message::default()
        }
    }

    #[test]
    fn update_deserializes_with_message() {
        let raw = r#"{
            "update_id": 10,
            "message": {
                "message_id": 3,
                "date": 1700000000,
                "chat": {"id": 42, "type": "private", "first_name": "Ada"},
                "from": {"id": 42, "is_bot": false, "first_name": "Ada"},
                "text": "hello",
                "unknown_field": true
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.update_id, 10);
        assert_eq!(update.sent_from().map(|u| u.id), Some(42));
        assert!(update.from_chat().unwrap().is_private());
        assert_eq!(update.message.unwrap().text.as_deref(), Some("hello"));
    }

    #[test]
    fn callback_query_helpers() {
        let raw = r#"{
            "update_id": 11,
            "callback_query": {
                "id": "q1",
                "from": {"id": 7, "first_name": "Bo"},
                "chat_instance": "ci",
                "data": "vote:yes",
                "message": {"message_id": 9, "chat": {"id": -100, "type": "supergroup"}}
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.callback_data(), Some("vote:yes"));
        assert_eq!(update.sent_from().map(|u| u.id), Some(7));
        assert!(update.from_chat().unwrap().is_group());
    }

    #[test]
    fn command_parsing() {
        let msg = command_message("/start@my_bot hello there", 13);
        assert!(msg.is_command());
        assert_eq!(msg.command(), Some("start"));
        assert_eq!(msg.command_with_at(), Some("start@my_bot"));
        assert_eq!(msg.command_arguments(), Some("hello there"));
    }

    #[test]
    fn command_offsets_are_utf16() {
        let msg = command_message("/echo 😀 hi", 5);
        assert_eq!(msg.command(), Some("echo"));
        assert_eq!(msg.command_arguments(), Some("😀 hi"));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        let msg = Message {
            text: Some("just text".to_string()),
            ..Message::default()
        };
        assert!(!msg.is_command());
        assert_eq!(msg.command(), None);
        assert_eq!(msg.command_arguments(), None);
    }

    #[test]
    fn command_scope_is_tagged() {
        let scope = BotCommandScope::ChatMember {
            chat_id: -5,
            user_id: 9,
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "chat_member", "chat_id": -5, "user_id": 9})
        );
        let json = serde_json::to_value(BotCommandScope::AllPrivateChats).unwrap();
        assert_eq!(json, serde_json::json!({"type": "all_private_chats"}));
    }

    #[test]
    fn reply_keyboard_defaults_to_resize() {
        let markup = ReplyKeyboardMarkup::new([keyboard_row([
            KeyboardButton::new("Yes"),
            KeyboardButton::location("Where am I"),
        ])]);
        let json = serde_json::to_value(ReplyMarkup::from(markup)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "keyboard": [[{"text": "Yes"}, {"text": "Where am I", "request_location": true}]],
                "resize_keyboard": true
            })
        );
    }

    #[test]
    fn remove_keyboard_serializes_flag() {
        let json = serde_json::to_value(ReplyMarkup::from(ReplyKeyboardRemove::default())).unwrap();
        assert_eq!(json, serde_json::json!({"remove_keyboard": true}));
    }

    #[test]
    fn failed_envelope_decodes_parameters() {
        let raw = r#"{"ok":false,"error_code":400,"description":"Bad Request: group chat was upgraded","parameters":{"migrate_to_chat_id":-1001}}"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_null());
        assert_eq!(resp.parameters.unwrap().migrate_to_chat_id, Some(-1001));
    }
}
