//! Outbound method configurations.
//!
//! # Design
//! Every remote method is a plain struct implementing [`ApiMethod`]: it names
//! the remote method and renders itself into [`Params`]. Methods that carry
//! files also list them through [`ApiMethod::files`]; the client decides from
//! those whether the call goes out form-encoded or as multipart.
//!
//! Shared field groups (`BaseChat` for sends, `BaseEdit` for edits) are
//! embedded by value and contribute their own parameters first.

use crate::error::ParamsError;
use crate::files::{RequestFile, RequestFileData};
use crate::params::Params;
use crate::types::{
    BotCommand, BotCommandScope, InlineKeyboardMarkup, MessageEntity, ReplyMarkup,
};

/// A remote Bot API method with its parameters.
pub trait ApiMethod {
    /// Remote method name, e.g. `sendMessage`.
    fn method(&self) -> &'static str;

    /// Render the configuration into request fields.
    fn params(&self) -> Result<Params, ParamsError>;

    /// Files sent alongside the fields.
    fn files(&self) -> Vec<RequestFile> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Shared field groups
// ---------------------------------------------------------------------------

/// Fields common to every method that sends something into a chat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseChat {
    pub chat_id: i64,
    pub channel_username: String,
    pub reply_to_message_id: i64,
    pub reply_markup: Option<ReplyMarkup>,
    pub disable_notification: bool,
    pub allow_sending_without_reply: bool,
}

impl BaseChat {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            ..Self::default()
        }
    }

    pub fn channel(username: impl Into<String>) -> Self {
        Self {
            channel_username: username.into(),
            ..Self::default()
        }
    }

    pub fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        params.add_first_valid("chat_id", self.chat_id, &self.channel_username);
        params.add_non_zero("reply_to_message_id", self.reply_to_message_id);
        params.add_bool("disable_notification", self.disable_notification);
        params.add_bool("allow_sending_without_reply", self.allow_sending_without_reply);
        params.add_json_opt("reply_markup", self.reply_markup.as_ref())?;
        Ok(params)
    }
}

/// Fields common to every method that changes an existing message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseEdit {
    pub chat_id: i64,
    pub channel_username: String,
    pub message_id: i64,
    pub inline_message_id: String,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl BaseEdit {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
            ..Self::default()
        }
    }

    pub fn inline(inline_message_id: impl Into<String>) -> Self {
        Self {
            inline_message_id: inline_message_id.into(),
            ..Self::default()
        }
    }

    /// An inline message id replaces the chat id and message id.
    pub fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        if self.inline_message_id.is_empty() {
            params.add_first_valid("chat_id", self.chat_id, &self.channel_username);
            params.add_non_zero("message_id", self.message_id);
        } else {
            params.insert("inline_message_id", self.inline_message_id.as_str());
        }
        params.add_json_opt("reply_markup", self.reply_markup.as_ref())?;
        Ok(params)
    }
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageConfig {
    pub base: BaseChat,
    pub text: String,
    pub parse_mode: String,
    pub entities: Vec<MessageEntity>,
    pub disable_web_page_preview: bool,
}

impl MessageConfig {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            base: BaseChat::new(chat_id),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn to_channel(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            base: BaseChat::channel(username),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.base.reply_to_message_id = message_id;
        self
    }

    pub fn parse_mode(mut self, mode: impl Into<String>) -> Self {
        self.parse_mode = mode.into();
        self
    }

    pub fn reply_markup(mut self, markup: impl Into<ReplyMarkup>) -> Self {
        self.base.reply_markup = Some(markup.into());
        self
    }
}

impl ApiMethod for MessageConfig {
    fn method(&self) -> &'static str {
        "sendMessage"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = self.base.params()?;
        params.add_non_empty("text", &self.text);
        params.add_bool("disable_web_page_preview", self.disable_web_page_preview);
        params.add_non_empty("parse_mode", &self.parse_mode);
        params.add_json_non_empty("entities", &self.entities)?;
        Ok(params)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationConfig {
    pub base: BaseChat,
    pub latitude: f64,
    pub longitude: f64,
    pub horizontal_accuracy: f64,
    pub live_period: i64,
}

impl LocationConfig {
    pub fn new(chat_id: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            base: BaseChat::new(chat_id),
            latitude,
            longitude,
            ..Self::default()
        }
    }
}

impl ApiMethod for LocationConfig {
    fn method(&self) -> &'static str {
        "sendLocation"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = self.base.params()?;
        // Coordinates are required; 0.0 is a valid latitude/longitude.
        params.insert("latitude", self.latitude.to_string());
        params.insert("longitude", self.longitude.to_string());
        params.add_non_zero("horizontal_accuracy", self.horizontal_accuracy);
        params.add_non_zero("live_period", self.live_period);
        Ok(params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoConfig {
    pub base: BaseChat,
    pub photo: RequestFileData,
    pub caption: String,
    pub parse_mode: String,
    pub caption_entities: Vec<MessageEntity>,
}

impl PhotoConfig {
    pub fn new(chat_id: i64, photo: RequestFileData) -> Self {
        Self {
            base: BaseChat::new(chat_id),
            photo,
            caption: String::new(),
            parse_mode: String::new(),
            caption_entities: Vec::new(),
        }
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }
}

impl ApiMethod for PhotoConfig {
    fn method(&self) -> &'static str {
        "sendPhoto"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = self.base.params()?;
        params.add_non_empty("caption", &self.caption);
        params.add_non_empty("parse_mode", &self.parse_mode);
        params.add_json_non_empty("caption_entities", &self.caption_entities)?;
        Ok(params)
    }

    fn files(&self) -> Vec<RequestFile> {
        vec![RequestFile::new("photo", self.photo.clone())]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentConfig {
    pub base: BaseChat,
    pub document: RequestFileData,
    pub thumbnail: Option<RequestFileData>,
    pub caption: String,
    pub parse_mode: String,
    pub disable_content_type_detection: bool,
}

impl DocumentConfig {
    pub fn new(chat_id: i64, document: RequestFileData) -> Self {
        Self {
            base: BaseChat::new(chat_id),
            document,
            thumbnail: None,
            caption: String::new(),
            parse_mode: String::new(),
            disable_content_type_detection: false,
        }
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn thumbnail(mut self, thumbnail: RequestFileData) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }
}

impl ApiMethod for DocumentConfig {
    fn method(&self) -> &'static str {
        "sendDocument"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = self.base.params()?;
        params.add_non_empty("caption", &self.caption);
        params.add_non_empty("parse_mode", &self.parse_mode);
        params.add_bool(
            "disable_content_type_detection",
            self.disable_content_type_detection,
        );
        Ok(params)
    }

    fn files(&self) -> Vec<RequestFile> {
        let mut files = vec![RequestFile::new("document", self.document.clone())];
        if let Some(thumbnail) = &self.thumbnail {
            files.push(RequestFile::new("thumbnail", thumbnail.clone()));
        }
        files
    }
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditMessageTextConfig {
    pub base: BaseEdit,
    pub text: String,
    pub parse_mode: String,
    pub entities: Vec<MessageEntity>,
    pub disable_web_page_preview: bool,
}

impl EditMessageTextConfig {
    pub fn new(chat_id: i64, message_id: i64, text: impl Into<String>) -> Self {
        Self {
            base: BaseEdit::new(chat_id, message_id),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn inline(inline_message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            base: BaseEdit::inline(inline_message_id),
            text: text.into(),
            ..Self::default()
        }
    }
}

impl ApiMethod for EditMessageTextConfig {
    fn method(&self) -> &'static str {
        "editMessageText"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = self.base.params()?;
        params.insert("text", self.text.as_str());
        params.add_non_empty("parse_mode", &self.parse_mode);
        params.add_bool("disable_web_page_preview", self.disable_web_page_preview);
        params.add_json_non_empty("entities", &self.entities)?;
        Ok(params)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopPollConfig {
    pub base: BaseEdit,
}

impl StopPollConfig {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            base: BaseEdit::new(chat_id, message_id),
        }
    }
}

impl ApiMethod for StopPollConfig {
    fn method(&self) -> &'static str {
        "stopPoll"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        self.base.params()
    }
}

// ---------------------------------------------------------------------------
// Updates and webhooks
// ---------------------------------------------------------------------------

/// Parameters for one `getUpdates` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateConfig {
    pub offset: i64,
    pub limit: i64,
    /// Long-poll timeout in seconds.
    pub timeout: i64,
    pub allowed_updates: Vec<String>,
}

impl UpdateConfig {
    pub fn new(offset: i64) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn timeout(mut self, timeout: i64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn allowed_updates<S: Into<String>>(mut self, kinds: impl IntoIterator<Item = S>) -> Self {
        self.allowed_updates = kinds.into_iter().map(Into::into).collect();
        self
    }
}

impl ApiMethod for UpdateConfig {
    fn method(&self) -> &'static str {
        "getUpdates"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        params.add_non_zero("offset", self.offset);
        params.add_non_zero("limit", self.limit);
        params.add_non_zero("timeout", self.timeout);
        params.add_json_non_empty("allowed_updates", &self.allowed_updates)?;
        Ok(params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    pub certificate: Option<RequestFileData>,
    pub ip_address: String,
    pub max_connections: i64,
    pub allowed_updates: Vec<String>,
    pub drop_pending_updates: bool,
    pub secret_token: String,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            certificate: None,
            ip_address: String::new(),
            max_connections: 0,
            allowed_updates: Vec::new(),
            drop_pending_updates: false,
            secret_token: String::new(),
        }
    }

    /// A webhook using a self-signed certificate that must be uploaded.
    pub fn with_certificate(url: impl Into<String>, certificate: RequestFileData) -> Self {
        Self {
            certificate: Some(certificate),
            ..Self::new(url)
        }
    }
}

impl ApiMethod for WebhookConfig {
    fn method(&self) -> &'static str {
        "setWebhook"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        params.insert("url", self.url.as_str());
        params.add_non_empty("ip_address", &self.ip_address);
        params.add_non_zero("max_connections", self.max_connections);
        params.add_json_non_empty("allowed_updates", &self.allowed_updates)?;
        params.add_bool("drop_pending_updates", self.drop_pending_updates);
        params.add_non_empty("secret_token", &self.secret_token);
        Ok(params)
    }

    fn files(&self) -> Vec<RequestFile> {
        self.certificate
            .iter()
            .map(|cert| RequestFile::new("certificate", cert.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteWebhookConfig {
    pub drop_pending_updates: bool,
}

impl ApiMethod for DeleteWebhookConfig {
    fn method(&self) -> &'static str {
        "deleteWebhook"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        params.add_bool("drop_pending_updates", self.drop_pending_updates);
        Ok(params)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub file_id: String,
}

impl FileConfig {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
        }
    }
}

impl ApiMethod for FileConfig {
    fn method(&self) -> &'static str {
        "getFile"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        params.insert("file_id", self.file_id.as_str());
        Ok(params)
    }
}

// ---------------------------------------------------------------------------
// Bot commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetMyCommandsConfig {
    pub commands: Vec<BotCommand>,
    pub scope: Option<BotCommandScope>,
    pub language_code: String,
}

impl SetMyCommandsConfig {
    pub fn new(commands: impl IntoIterator<Item = BotCommand>) -> Self {
        Self {
            commands: commands.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_scope(
        scope: BotCommandScope,
        commands: impl IntoIterator<Item = BotCommand>,
    ) -> Self {
        Self {
            scope: Some(scope),
            ..Self::new(commands)
        }
    }

    pub fn with_scope_and_language(
        scope: BotCommandScope,
        language_code: impl Into<String>,
        commands: impl IntoIterator<Item = BotCommand>,
    ) -> Self {
        Self {
            language_code: language_code.into(),
            ..Self::with_scope(scope, commands)
        }
    }
}

impl ApiMethod for SetMyCommandsConfig {
    fn method(&self) -> &'static str {
        "setMyCommands"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        params.add_json("commands", &self.commands)?;
        params.add_json_opt("scope", self.scope.as_ref())?;
        params.add_non_empty("language_code", &self.language_code);
        Ok(params)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteMyCommandsConfig {
    pub scope: Option<BotCommandScope>,
    pub language_code: String,
}

impl DeleteMyCommandsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(scope: BotCommandScope) -> Self {
        Self {
            scope: Some(scope),
            ..Self::default()
        }
    }

    pub fn with_scope_and_language(
        scope: BotCommandScope,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            scope: Some(scope),
            language_code: language_code.into(),
        }
    }
}

impl ApiMethod for DeleteMyCommandsConfig {
    fn method(&self) -> &'static str {
        "deleteMyCommands"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        params.add_json_opt("scope", self.scope.as_ref())?;
        params.add_non_empty("language_code", &self.language_code);
        Ok(params)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetMyCommandsConfig {
    pub scope: Option<BotCommandScope>,
    pub language_code: String,
}

impl GetMyCommandsConfig {
    pub fn with_scope(scope: BotCommandScope) -> Self {
        Self {
            scope: Some(scope),
            ..Self::default()
        }
    }
}

impl ApiMethod for GetMyCommandsConfig {
    fn method(&self) -> &'static str {
        "getMyCommands"
    }

    fn params(&self) -> Result<Params, ParamsError> {
        let mut params = Params::new();
        params.add_json_opt("scope", self.scope.as_ref())?;
        params.add_non_empty("language_code", &self.language_code);
        Ok(params)
    }
}
