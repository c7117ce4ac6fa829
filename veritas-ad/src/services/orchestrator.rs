//! Analysis orchestration
//!
//! One `analyze` call: validate → stage → invoke engine → parse → release.
//! Every error is turned into an [`AnalysisError`] here, and the staged
//! file is released before `analyze` returns whatever happened. No staged
//! file outlives the call. If the call itself is cancelled, `StagedFile`'s
//! drop and the engine's kill-on-drop take care of cleanup.
//!
//! There is no lock around `analyze`: concurrent calls share only the
//! staging store and the engine pool, both of which are safe to share.

use std::path::Path;
use thiserror::Error;
use tracing::Instrument;

use crate::models::{AnalysisResult, AnalysisRun, AnalysisStage, UploadRequest};
use crate::services::engine_adapter::EngineError;
use crate::services::engine_pool::EnginePool;
use crate::services::result_parser::{parse_engine_output, ParseError};
use crate::services::staging_store::{StagingError, StagingStore};

/// Failure category of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    StagingIo,
    EngineLaunch,
    EngineExecution,
    EngineTimeout,
    MalformedResult,
    SchemaValidation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::StagingIo => "STAGING_IO_ERROR",
            ErrorKind::EngineLaunch => "ENGINE_LAUNCH_ERROR",
            ErrorKind::EngineExecution => "ENGINE_EXECUTION_ERROR",
            ErrorKind::EngineTimeout => "ENGINE_TIMEOUT",
            ErrorKind::MalformedResult => "MALFORMED_RESULT",
            ErrorKind::SchemaValidation => "SCHEMA_VALIDATION_ERROR",
        }
    }
}

/// Failed analysis; `kind()` is the tag, `Display` the server-side detail
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalysisError::Staging(_) => ErrorKind::StagingIo,
            AnalysisError::Engine(EngineError::Launch { .. } | EngineError::PoolClosed) => {
                ErrorKind::EngineLaunch
            }
            AnalysisError::Engine(EngineError::Execution { .. }) => ErrorKind::EngineExecution,
            AnalysisError::Engine(EngineError::Timeout { .. }) => ErrorKind::EngineTimeout,
            AnalysisError::Parse(ParseError::EngineReported(_)) => ErrorKind::EngineExecution,
            AnalysisError::Parse(ParseError::EmptyOutput | ParseError::Malformed(_)) => {
                ErrorKind::MalformedResult
            }
            AnalysisError::Parse(ParseError::Schema(_)) => ErrorKind::SchemaValidation,
        }
    }
}

/// Outcome of one `analyze` call
pub type AnalysisOutcome = Result<AnalysisResult, AnalysisError>;

/// Composes staging, engine and parser into one analysis
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    staging: StagingStore,
    engines: EnginePool,
}

impl AnalysisOrchestrator {
    pub fn new(staging: StagingStore, engines: EnginePool) -> Self {
        Self { staging, engines }
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    pub fn engines(&self) -> &EnginePool {
        &self.engines
    }

    /// Stop accepting work
    ///
    /// Calls already holding a staging slot and engine slot run to
    /// completion; calls still waiting for either fail immediately.
    pub fn close(&self) {
        self.staging.close();
        self.engines.close();
    }

    /// Analyze one upload
    ///
    /// Runs the engine at most once; failures are not retried since the
    /// engine is deterministic for a given file.
    pub async fn analyze(&self, request: UploadRequest) -> AnalysisOutcome {
        let mut run = AnalysisRun::new(request.kind);
        let span = tracing::info_span!(
            "analysis",
            analysis_id = %run.analysis_id,
            kind = %run.kind,
        );

        async move {
            tracing::info!(
                original_name = %request.original_name,
                bytes = request.bytes.len(),
                "Analysis received"
            );

            if request.bytes.is_empty() {
                return fail(&mut run, AnalysisError::InvalidInput("uploaded file is empty".to_string()));
            }

            let staged = match self.staging.stage(&request.bytes, &request.original_name).await {
                Ok(staged) => staged,
                Err(e) => return fail(&mut run, e.into()),
            };
            advance(&mut run, AnalysisStage::Staged);

            let outcome = self.invoke_and_parse(&mut run, staged.path()).await;

            // Unconditional: success and every failure pass through here
            staged.release().await;

            match outcome {
                Ok(result) => {
                    advance(&mut run, AnalysisStage::Completed);
                    tracing::info!(
                        cnn = %result.cnn.label,
                        rnn = %result.rnn.label,
                        elapsed_ms = run.elapsed_ms(),
                        "Analysis completed"
                    );
                    Ok(result)
                }
                Err(e) => fail(&mut run, e),
            }
        }
        .instrument(span)
        .await
    }

    async fn invoke_and_parse(&self, run: &mut AnalysisRun, staged_path: &Path) -> AnalysisOutcome {
        let invocation = self.engines.invoke(run.kind, staged_path).await?;
        advance(run, AnalysisStage::Invoked);
        tracing::debug!(
            duration_ms = invocation.duration.as_millis() as u64,
            stdout_bytes = invocation.stdout.len(),
            "Engine output captured"
        );

        let result = parse_engine_output(&invocation.stdout)?;
        advance(run, AnalysisStage::Parsed);
        Ok(result)
    }
}

fn advance(run: &mut AnalysisRun, stage: AnalysisStage) {
    let transition = run.transition_to(stage);
    tracing::debug!(
        from = ?transition.old_stage,
        to = ?transition.new_stage,
        "Analysis stage transition"
    );
}

fn fail(run: &mut AnalysisRun, error: AnalysisError) -> AnalysisOutcome {
    let failed_in = run.stage;
    advance(run, AnalysisStage::Failed);
    let kind = error.kind();
    if kind == ErrorKind::InvalidInput {
        tracing::info!(kind = kind.as_str(), error = %error, "Analysis rejected");
    } else {
        tracing::error!(
            kind = kind.as_str(),
            failed_in = ?failed_in,
            elapsed_ms = run.elapsed_ms(),
            error = %error,
            "Analysis failed"
        );
    }
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::result_parser::SchemaViolation;
    use std::time::Duration;

    #[test]
    fn test_error_kind_mapping() {
        let cases = [
            (AnalysisError::InvalidInput("x".into()), ErrorKind::InvalidInput),
            (
                AnalysisError::Staging(StagingError::Closed),
                ErrorKind::StagingIo,
            ),
            (
                AnalysisError::Engine(EngineError::Launch {
                    program: "x".into(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
                ErrorKind::EngineLaunch,
            ),
            (
                AnalysisError::Engine(EngineError::Execution {
                    exit_code: Some(1),
                    stderr: String::new(),
                }),
                ErrorKind::EngineExecution,
            ),
            (
                AnalysisError::Engine(EngineError::Timeout {
                    budget: Duration::from_secs(1),
                }),
                ErrorKind::EngineTimeout,
            ),
            (
                AnalysisError::Parse(ParseError::EngineReported("x".into())),
                ErrorKind::EngineExecution,
            ),
            (
                AnalysisError::Parse(ParseError::EmptyOutput),
                ErrorKind::MalformedResult,
            ),
            (
                AnalysisError::Parse(ParseError::Malformed("x".into())),
                ErrorKind::MalformedResult,
            ),
            (
                AnalysisError::Parse(ParseError::Schema(SchemaViolation::MissingField("rnn".into()))),
                ErrorKind::SchemaValidation,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.kind(), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_error_kind_codes_are_distinct() {
        let codes: std::collections::HashSet<_> = [
            ErrorKind::InvalidInput,
            ErrorKind::StagingIo,
            ErrorKind::EngineLaunch,
            ErrorKind::EngineExecution,
            ErrorKind::EngineTimeout,
            ErrorKind::MalformedResult,
            ErrorKind::SchemaValidation,
        ]
        .iter()
        .map(|k| k.as_str())
        .collect();
        assert_eq!(codes.len(), 7);
    }
}
