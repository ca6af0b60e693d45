//! Async Bot API client.
//!
//! # Design
//! `BotApi` owns a `reqwest::Client` and the endpoint templates. Each call is
//! described with `HttpRequest::build`, sent as a form or multipart POST, and
//! the response envelope is checked before the `result` payload is decoded
//! into the caller's type. The client is cheap to clone; clones share the
//! connection pool.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::BotConfig;
use crate::configs::{ApiMethod, FileConfig, GetMyCommandsConfig, UpdateConfig};
use crate::error::{Error, ErrorKind, MethodContext, Result};
use crate::files::RequestFile;
use crate::http::{self, HttpRequest, RequestBody, FORM_CONTENT_TYPE};
use crate::params::Params;
use crate::poller::{UpdatePoller, UpdateSource, UpdatesChannel};
use crate::types::{ApiResponse, BotCommand, File, Message, Update, User, WebhookInfo};

/// Slack on top of the long-poll window for the server's reply to arrive.
const LONG_POLL_MARGIN: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BotApi {
    client: reqwest::Client,
    token: String,
    api_endpoint: String,
    file_endpoint: String,
    debug: bool,
    buffer: usize,
    retry_delay: Duration,
    http_timeout: Duration,
    me: User,
}

impl fmt::Debug for BotApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotApi")
            .field("api_endpoint", &self.api_endpoint)
            .field("debug", &self.debug)
            .field("me", &self.me.username)
            .finish_non_exhaustive()
    }
}

impl BotApi {
    /// Connect with default settings and check the token with `getMe`.
    pub async fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_config(BotConfig::new(token)).await
    }

    pub async fn with_config(config: BotConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .method_context("getMe")?;
        Self::with_client(config, client).await
    }

    /// Use a caller-built HTTP client. Its own timeout settings apply, except
    /// that `getUpdates` gets `http_timeout` plus the long-poll timeout.
    pub async fn with_client(config: BotConfig, client: reqwest::Client) -> Result<Self> {
        let mut bot = Self::unchecked(config, client)?;
        bot.me = bot.get_me().await?;
        debug!(username = ?bot.me.username, "authorized bot");
        Ok(bot)
    }

    fn unchecked(config: BotConfig, client: reqwest::Client) -> Result<Self> {
        config.validate().method_context("getMe")?;
        Ok(Self {
            client,
            retry_delay: config.retry_delay(),
            http_timeout: config.http_timeout(),
            token: config.token,
            api_endpoint: config.api_endpoint,
            file_endpoint: config.file_endpoint,
            debug: config.debug,
            buffer: config.buffer,
            me: User::default(),
        })
    }

    /// The bot's own account, as reported by `getMe` at construction.
    pub fn me(&self) -> &User {
        &self.me
    }

    pub fn set_api_endpoint(&mut self, template: impl Into<String>) {
        self.api_endpoint = template.into();
    }

    pub fn set_file_endpoint(&mut self, template: impl Into<String>) {
        self.file_endpoint = template.into();
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn method_url(&self, method: &str) -> String {
        http::method_url(&self.api_endpoint, &self.token, method)
    }

    /// Download URL for a `file_path` returned by `getFile`.
    pub fn file_url(&self, path: &str) -> String {
        http::file_url(&self.file_endpoint, &self.token, path)
    }

    /// Call `method` with plain fields.
    pub async fn make_request(&self, method: &str, params: Params) -> Result<ApiResponse> {
        self.execute(method, params, Vec::new()).await
    }

    /// Call `method` with fields and files; multipart only if a file needs uploading.
    pub async fn upload_files(
        &self,
        method: &str,
        params: Params,
        files: Vec<RequestFile>,
    ) -> Result<ApiResponse> {
        self.execute(method, params, files).await
    }

    /// Send any configured method and return the raw envelope.
    pub async fn request<M: ApiMethod + ?Sized>(&self, config: &M) -> Result<ApiResponse> {
        let method = config.method();
        let params = config.params().method_context(method)?;
        self.execute(method, params, config.files()).await
    }

    /// Send a method whose result is a `Message`.
    pub async fn send<M: ApiMethod + ?Sized>(&self, config: &M) -> Result<Message> {
        let resp = self.request(config).await?;
        decode_result(config.method(), resp.result)
    }

    pub async fn get_me(&self) -> Result<User> {
        let resp = self.make_request("getMe", Params::new()).await?;
        decode_result("getMe", resp.result)
    }

    pub async fn get_updates(&self, config: &UpdateConfig) -> Result<Vec<Update>> {
        let resp = self.request(config).await?;
        decode_result(config.method(), resp.result)
    }

    pub async fn get_webhook_info(&self) -> Result<WebhookInfo> {
        let resp = self.make_request("getWebhookInfo", Params::new()).await?;
        decode_result("getWebhookInfo", resp.result)
    }

    pub async fn get_my_commands(&self) -> Result<Vec<BotCommand>> {
        self.get_my_commands_with_config(&GetMyCommandsConfig::default())
            .await
    }

    pub async fn get_my_commands_with_config(
        &self,
        config: &GetMyCommandsConfig,
    ) -> Result<Vec<BotCommand>> {
        let resp = self.request(config).await?;
        decode_result(config.method(), resp.result)
    }

    pub async fn get_file(&self, config: &FileConfig) -> Result<File> {
        let resp = self.request(config).await?;
        decode_result(config.method(), resp.result)
    }

    /// Resolve a file id to its download URL.
    pub async fn get_file_direct_url(&self, file_id: &str) -> Result<String> {
        let file = self.get_file(&FileConfig::new(file_id)).await?;
        match file.file_path {
            Some(path) => Ok(self.file_url(&path)),
            None => Err(Error::new(
                "getFile",
                ErrorKind::Misuse(format!("file {file_id} has no download path")),
            )),
        }
    }

    /// Start long polling with `config` as the first request.
    pub fn get_updates_chan(&self, config: UpdateConfig) -> UpdatesChannel {
        UpdatePoller::new(self.clone(), config)
            .buffer(self.buffer)
            .retry_delay(self.retry_delay)
            .spawn()
    }

    async fn execute(
        &self,
        method: &str,
        params: Params,
        files: Vec<RequestFile>,
    ) -> Result<ApiResponse> {
        if self.debug {
            debug!(method, ?params, files = files.len(), "request");
        }

        let long_poll = long_poll_timeout(method, &params);
        let HttpRequest { url, body } = HttpRequest::build(self.method_url(method), params, files);
        let mut builder = match body {
            RequestBody::Form(form) => self
                .client
                .post(url)
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(form),
            RequestBody::Multipart { params, files } => {
                let form = multipart_form(params, files).await.method_context(method)?;
                self.client.post(url).multipart(form)
            }
        };

        if let Some(poll) = long_poll {
            builder = builder.timeout(self.http_timeout + poll + LONG_POLL_MARGIN);
        }

        let resp = builder.send().await.method_context(method)?;
        let status = resp.status();
        let body = resp.bytes().await.method_context(method)?;
        if self.debug {
            debug!(method, %status, body = %String::from_utf8_lossy(&body), "response");
        }
        http::decode_envelope(method, &body)
    }
}

/// `getUpdates` holds the connection open for up to its `timeout` field.
fn long_poll_timeout(method: &str, params: &Params) -> Option<Duration> {
    if method != "getUpdates" {
        return None;
    }
    let secs = params.get("timeout")?.parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

/// Fields first, then files, in the order the method listed them.
async fn multipart_form(params: Params, files: Vec<RequestFile>) -> std::io::Result<Form> {
    let mut form = Form::new();
    for (key, value) in params {
        form = form.text(key, value);
    }
    for file in files {
        let part = file.data.to_part().await?;
        form = form.part(file.name, part);
    }
    Ok(form)
}

fn decode_result<T: DeserializeOwned>(method: &str, result: serde_json::Value) -> Result<T> {
    serde_json::from_value(result).method_context(method)
}

#[async_trait]
impl UpdateSource for BotApi {
    async fn fetch_updates(&self, config: &UpdateConfig) -> Result<Vec<Update>> {
        self.get_updates(config).await
    }
}
