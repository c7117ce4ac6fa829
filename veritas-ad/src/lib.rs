//! veritas-ad library interface
//!
//! Exposes the router, state and analysis services for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::services::AnalysisOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Analysis pipeline; safe to call concurrently
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Largest accepted upload body
    pub max_upload_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last server-side failure, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(orchestrator: AnalysisOrchestrator, max_upload_bytes: usize) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            max_upload_bytes,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a server-side failure for `/health`
    ///
    /// Only the category and generic message are kept; client errors are
    /// not recorded.
    pub async fn record_error(&self, error: &ApiError) {
        let (status, code, message) = error.parts();
        if !status.is_server_error() {
            return;
        }
        let entry = format!("{} {}: {}", Utc::now().to_rfc3339(), code, message);
        *self.last_error.write().await = Some(entry);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analyze_routes(state.max_upload_bytes))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
