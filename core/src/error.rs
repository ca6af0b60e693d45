//! Error types for the Bot API client.
//!
//! # Design
//! Every error carries the name of the remote method it belongs to, so a
//! caller issuing several calls can tell which one failed without matching
//! on the kind. `ErrorKind` separates failures raised before any network
//! I/O (`Encoding`, `Misuse`, `Config`) from transport failures and from
//! well-formed rejections returned by the API (`Api`).

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::ResponseParameters;

pub type Result<T> = std::result::Result<T, Error>;

/// A failed Bot API call, tagged with the remote method name.
#[derive(Debug, Error)]
#[error("{method}: {kind}")]
pub struct Error {
    method: String,
    #[source]
    kind: ErrorKind,
}

impl Error {
    pub fn new(method: impl Into<String>, kind: impl Into<ErrorKind>) -> Self {
        Self {
            method: method.into(),
            kind: kind.into(),
        }
    }

    /// Remote method name, e.g. `sendMessage`.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// The remote rejection, if the API answered with `ok: false`.
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.kind {
            ErrorKind::Api(err) => Some(err),
            _ => None,
        }
    }

    /// True for connection, read and decode failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Transport(_) | ErrorKind::Decode(_) | ErrorKind::Io(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A structured parameter could not be serialized to JSON.
    #[error(transparent)]
    Encoding(#[from] ParamsError),

    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not a valid API envelope.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The API answered with `ok: false`.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The call cannot be made the way it was attempted.
    #[error("{0}")]
    Misuse(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Local file access failed while preparing an upload.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejection reported by the Bot API in a well-formed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("API error {code}: {description}")]
pub struct ApiError {
    pub code: i64,
    pub description: String,
    pub parameters: ResponseParameters,
}

impl ApiError {
    /// How long the API asks us to wait before repeating the request.
    pub fn retry_after(&self) -> Option<Duration> {
        self.parameters
            .retry_after
            .and_then(|secs| u64::try_from(secs).ok())
            .map(Duration::from_secs)
    }

    /// The supergroup a group chat was migrated to.
    pub fn migrate_to_chat_id(&self) -> Option<i64> {
        self.parameters.migrate_to_chat_id
    }
}

/// A structured field that failed to serialize.
#[derive(Debug, Error)]
#[error("failed to encode `{field}`: {source}")]
pub struct ParamsError {
    pub field: String,
    #[source]
    pub source: serde_json::Error,
}

/// Attach the remote method name to any lower-level failure.
pub(crate) trait MethodContext<T> {
    fn method_context(self, method: &str) -> Result<T>;
}

impl<T, E: Into<ErrorKind>> MethodContext<T> for std::result::Result<T, E> {
    fn method_context(self, method: &str) -> Result<T> {
        self.map_err(|e| Error::new(method, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(retry_after: Option<i64>) -> ApiError {
        ApiError {
            code: 429,
            description: "Too Many Requests: retry after 7".to_string(),
            parameters: ResponseParameters {
                migrate_to_chat_id: None,
                retry_after,
            },
        }
    }

    #[test]
    fn display_includes_method_and_description() {
        let err = Error::new("sendMessage", api_error(Some(7)));
        assert_eq!(
            err.to_string(),
            "sendMessage: API error 429: Too Many Requests: retry after 7"
        );
        assert_eq!(err.method(), "sendMessage");
    }

    #[test]
    fn retry_after_converts_seconds() {
        assert_eq!(api_error(Some(7)).retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(api_error(None).retry_after(), None);
        assert_eq!(api_error(Some(-1)).retry_after(), None);
    }

    #[test]
    fn api_error_accessor_only_matches_api_kind() {
        let err = Error::new("getMe", api_error(None));
        assert_eq!(err.api_error().map(|e| e.code), Some(429));
        assert!(!err.is_transport());

        let err = Error::new("getMe", ErrorKind::Misuse("nope".to_string()));
        assert!(err.api_error().is_none());
    }

    #[test]
    fn io_and_decode_count_as_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(Error::new("getUpdates", io).is_transport());

        let decode = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        assert!(Error::new("getUpdates", decode).is_transport());
    }

    #[test]
    fn method_context_wraps_errors() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result.method_context("sendPhoto").unwrap_err();
        assert_eq!(err.method(), "sendPhoto");
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
    }
}
