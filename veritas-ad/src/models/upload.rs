//! Upload request model

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media submitted for analysis
///
/// Selected by the route that received the upload, never sniffed from the
/// file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded file awaiting analysis
///
/// `original_name` is client-supplied and untrusted; it only contributes a
/// sanitized suffix to the staged file name.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub kind: MediaKind,
    pub original_name: String,
    pub bytes: Bytes,
}

impl UploadRequest {
    pub fn new(kind: MediaKind, original_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            kind,
            original_name: original_name.into(),
            bytes: bytes.into(),
        }
    }
}
