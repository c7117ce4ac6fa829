//! Upload analysis endpoints
//!
//! POST /api/analyze-audio, POST /api/analyze-video
//!
//! Each takes a multipart form with a single `file` field. The route picks
//! the media kind; the file content is not inspected here.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    models::{AnalysisResult, MediaKind, UploadRequest},
    services::AnalysisError,
    AppState,
};

/// Multipart field carrying the upload
const FILE_FIELD: &str = "file";

/// Successful analysis response
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub message: String,
    pub result: AnalysisResult,
}

/// POST /api/analyze-audio
pub async fn analyze_audio(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<AnalyzeResponse>> {
    analyze_upload(state, MediaKind::Audio, multipart).await
}

/// POST /api/analyze-video
pub async fn analyze_video(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<AnalyzeResponse>> {
    analyze_upload(state, MediaKind::Video, multipart).await
}

async fn analyze_upload(
    state: AppState,
    kind: MediaKind,
    mut multipart: Multipart,
) -> ApiResult<Json<AnalyzeResponse>> {
    let outcome = match read_upload(kind, &mut multipart).await {
        Ok(upload) => state.orchestrator.analyze(upload).await,
        Err(ApiError::Analysis { source, .. }) => {
            tracing::info!(kind = %kind, error = %source, "Rejected upload");
            Err(source)
        }
        Err(other) => {
            tracing::info!(kind = %kind, error = %other, "Rejected malformed upload");
            return Err(other);
        }
    };

    match outcome {
        Ok(result) => Ok(Json(AnalyzeResponse {
            message: "File uploaded and analyzed successfully".to_string(),
            result,
        })),
        Err(source) => {
            let error = ApiError::analysis(kind, source);
            state.record_error(&error).await;
            Err(error)
        }
    }
}

/// Pull the `file` field out of the form; other fields are skipped
async fn read_upload(kind: MediaKind, multipart: &mut Multipart) -> ApiResult<UploadRequest> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let Some(original_name) = field.file_name().map(str::to_string) else {
            return Err(ApiError::analysis(
                kind,
                AnalysisError::InvalidInput("`file` field is not a file".to_string()),
            ));
        };
        let bytes = field.bytes().await?;

        return Ok(UploadRequest::new(kind, original_name, bytes));
    }

    Err(ApiError::analysis(
        kind,
        AnalysisError::InvalidInput("missing `file` field".to_string()),
    ))
}

/// Build analysis routes with the upload size limit applied
pub fn analyze_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/analyze-audio", post(analyze_audio))
        .route("/api/analyze-video", post(analyze_video))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
