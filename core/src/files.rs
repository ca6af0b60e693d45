//! File references attached to outbound methods.
//!
//! A file is either uploaded (in-memory bytes or a local path) or referenced
//! by something the API already understands (a `file_id` or a URL). Only the
//! first kind forces a multipart request.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::multipart::Part;
use reqwest::Body;
use tokio_util::io::ReaderStream;

/// The data behind one file field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFileData {
    /// In-memory contents uploaded under `name`.
    Bytes { name: String, data: Bytes },
    /// A local file, opened and streamed at send time.
    Path(PathBuf),
    /// A file already stored on the API's servers.
    FileId(String),
    /// A URL the API downloads itself.
    Url(String),
}

impl RequestFileData {
    pub fn bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn file_id(id: impl Into<String>) -> Self {
        Self::FileId(id.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn needs_upload(&self) -> bool {
        matches!(self, Self::Bytes { .. } | Self::Path(_))
    }

    /// The plain field value for references that are not uploaded.
    pub fn send_data(&self) -> Option<&str> {
        match self {
            Self::FileId(value) | Self::Url(value) => Some(value),
            Self::Bytes { .. } | Self::Path(_) => None,
        }
    }

    /// File name reported in the multipart part header.
    pub fn upload_name(&self) -> Option<String> {
        match self {
            Self::Bytes { name, .. } => Some(name.clone()),
            Self::Path(path) => Some(file_name(path)),
            Self::FileId(_) | Self::Url(_) => None,
        }
    }

    /// Build the multipart part for this file.
    ///
    /// Local files are streamed in chunks; the handle is owned by the body
    /// stream and closed when the stream finishes or is dropped.
    pub(crate) async fn to_part(&self) -> std::io::Result<Part> {
        match self {
            Self::Bytes { name, data } => {
                let len = data.len() as u64;
                Ok(Part::stream_with_length(Body::from(data.clone()), len).file_name(name.clone()))
            }
            Self::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                let len = file.metadata().await?.len();
                let body = Body::wrap_stream(ReaderStream::new(file));
                Ok(Part::stream_with_length(body, len).file_name(file_name(path)))
            }
            Self::FileId(value) | Self::Url(value) => Ok(Part::text(value.clone())),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

/// A file bound to the form field it is sent under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFile {
    pub name: String,
    pub data: RequestFileData,
}

impl RequestFile {
    pub fn new(name: impl Into<String>, data: RequestFileData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// True if at least one file must be uploaded.
pub fn needs_upload(files: &[RequestFile]) -> bool {
    files.iter().any(|file| file.data.needs_upload())
}
