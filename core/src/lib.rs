//! Async client core for the Telegram Bot API.
//!
//! # Overview
//! Encodes method calls into form or multipart requests, sends them with
//! reqwest, and decodes the `ok/result` envelope. Updates arrive either from
//! a long-polling task (`BotApi::get_updates_chan`) or from an axum webhook
//! route (`webhook::listen_for_webhook`).
//!
//! # Design
//! - Every method is a config struct implementing `ApiMethod`; the client
//!   has one generic send path instead of a function per method.
//! - Request building (`params`, `files`, `http`) is pure and tested without
//!   a network; `BotApi` is the only place that performs I/O.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod configs;
pub mod error;
pub mod files;
pub mod http;
pub mod params;
pub mod poller;
pub mod types;
pub mod webhook;

pub use client::BotApi;
pub use config::{BotConfig, ConfigError};
pub use configs::{
    ApiMethod, BaseChat, BaseEdit, DeleteMyCommandsConfig, DeleteWebhookConfig, DocumentConfig,
    EditMessageTextConfig, FileConfig, GetMyCommandsConfig, LocationConfig, MessageConfig,
    PhotoConfig, SetMyCommandsConfig, StopPollConfig, UpdateConfig, WebhookConfig,
};
pub use error::{ApiError, Error, ErrorKind, ParamsError, Result};
pub use files::{RequestFile, RequestFileData};
pub use params::Params;
pub use poller::{Cursor, PollerState, UpdatePoller, UpdateSource, UpdatesChannel};
pub use types::{
    keyboard_row, ApiResponse, BotCommand, BotCommandScope, CallbackQuery, Chat, File,
    ForceReply, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, Message,
    MessageEntity, ReplyKeyboardMarkup, ReplyKeyboardRemove, ReplyMarkup, Update, User,
    WebhookInfo,
};
