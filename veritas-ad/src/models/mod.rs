//! Data models for veritas-ad (Authenticity Detection microservice)
//!
//! - Upload requests and media kinds
//! - Validated analysis results
//! - Per-request analysis state machine

pub mod analysis_result;
pub mod analysis_run;
pub mod upload;

pub use analysis_result::{AnalysisResult, Label, ModelVerdict};
pub use analysis_run::{AnalysisRun, AnalysisStage, StageTransition};
pub use upload::{MediaKind, UploadRequest};
