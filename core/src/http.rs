//! HTTP request description and response envelope handling.
//!
//! # Design
//! Building the request is kept apart from sending it. `HttpRequest` is plain
//! data describing the URL and body of one method call; `BotApi` turns it
//! into a reqwest call. The envelope helpers at the bottom are the other
//! half: they take raw response bytes and classify them into a result or an
//! `ApiError`. Both sides are pure and testable without a network.

use crate::error::{ApiError, Error, ErrorKind, Result};
use crate::files::{self, RequestFile};
use crate::params::Params;
use crate::types::ApiResponse;

/// Method URL template used unless overridden.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.telegram.org/bot{token}/{method}";

/// File download URL template used unless overridden.
pub const DEFAULT_FILE_ENDPOINT: &str = "https://api.telegram.org/file/bot{token}/{path}";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Render a method URL from an endpoint template.
pub fn method_url(template: &str, token: &str, method: &str) -> String {
    template
        .replace("{token}", token)
        .replace("{method}", method)
}

/// Render a file download URL from a file endpoint template.
pub fn file_url(template: &str, token: &str, path: &str) -> String {
    template.replace("{token}", token).replace("{path}", path)
}

/// The body of one method call.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` text.
    Form(String),
    /// Fields first, then files, as `multipart/form-data`.
    Multipart {
        params: Params,
        files: Vec<RequestFile>,
    },
}

/// One method call described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub body: RequestBody,
}

impl HttpRequest {
    /// Pick the body encoding for `params` and `files`.
    ///
    /// When no file needs uploading, file references travel as ordinary
    /// fields and the request stays form-encoded.
    pub fn build(url: String, mut params: Params, files: Vec<RequestFile>) -> Self {
        if files::needs_upload(&files) {
            return Self {
                url,
                body: RequestBody::Multipart { params, files },
            };
        }

        for file in &files {
            if let Some(value) = file.data.send_data() {
                params.insert(file.name.as_str(), value);
            }
        }
        Self {
            url,
            body: RequestBody::Form(params.encode_form()),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart { .. })
    }
}

/// Decode raw response bytes into an envelope and check it.
pub fn decode_envelope(method: &str, body: &[u8]) -> Result<ApiResponse> {
    let envelope: ApiResponse =
        serde_json::from_slice(body).map_err(|e| Error::new(method, e))?;
    check_envelope(method, envelope)
}

/// Turn an `ok: false` envelope into an `ApiError`.
pub fn check_envelope(method: &str, envelope: ApiResponse) -> Result<ApiResponse> {
    if envelope.ok {
        return Ok(envelope);
    }
    let err = ApiError {
        code: envelope.error_code.unwrap_or_default(),
        description: envelope.description.unwrap_or_default(),
        parameters: envelope.parameters.unwrap_or_default(),
    };
    Err(Error::new(method, ErrorKind::Api(err)))
}
