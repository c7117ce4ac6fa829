//! Error types for veritas-ad
//!
//! Clients get a category code and a generic message. Engine stderr, exit
//! codes and filesystem paths stay in the server log.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::MediaKind;
use crate::services::{AnalysisError, ErrorKind};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Multipart body could not be read (400, or 413 when over the limit)
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    /// Analysis pipeline failure
    #[error("Analysis of {kind} failed: {source}")]
    Analysis {
        kind: MediaKind,
        #[source]
        source: AnalysisError,
    },
}

impl ApiError {
    pub fn analysis(kind: MediaKind, source: AnalysisError) -> Self {
        ApiError::Analysis { kind, source }
    }

    /// Status, code and client-facing message
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Multipart(err) => {
                let status = err.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "BAD_REQUEST"
                };
                (status, code, "Invalid file upload".to_string())
            }
            ApiError::Analysis { kind, source } => {
                let error_kind = source.kind();
                let (status, message) = match error_kind {
                    ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, "Invalid file upload".to_string()),
                    ErrorKind::StagingIo => (StatusCode::INTERNAL_SERVER_ERROR, "Error saving file".to_string()),
                    ErrorKind::EngineLaunch => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Analysis engine unavailable".to_string(),
                    ),
                    ErrorKind::EngineTimeout => (
                        StatusCode::GATEWAY_TIMEOUT,
                        format!("Analysis of {} timed out", kind),
                    ),
                    ErrorKind::EngineExecution | ErrorKind::MalformedResult | ErrorKind::SchemaValidation => {
                        (StatusCode::BAD_GATEWAY, format!("Error analyzing {}", kind))
                    }
                };
                (status, error_kind.as_str(), message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
