//! Per-request analysis state machine
//!
//! RECEIVED → STAGED → INVOKED → PARSED → COMPLETED, with FAILED reachable
//! from any non-terminal state.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::MediaKind;

/// Analysis workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    /// Upload accepted, nothing on disk yet
    Received,
    /// Upload written to the scratch directory
    Staged,
    /// Engine exited successfully
    Invoked,
    /// Engine output validated
    Parsed,
    /// Result returned to caller
    Completed,
    /// Absorbing failure state
    Failed,
}

impl AnalysisStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStage::Completed | AnalysisStage::Failed)
    }
}

/// State transition event
#[derive(Debug, Clone)]
pub struct StageTransition {
    pub analysis_id: Uuid,
    pub old_stage: AnalysisStage,
    pub new_stage: AnalysisStage,
    pub transitioned_at: DateTime<Utc>,
}

/// Bookkeeping for one `analyze` call
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    /// Correlates log lines for one request
    pub analysis_id: Uuid,
    pub kind: MediaKind,
    pub stage: AnalysisStage,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AnalysisRun {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            analysis_id: Uuid::new_v4(),
            kind,
            stage: AnalysisStage::Received,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new stage
    ///
    /// Terminal stages absorb: once COMPLETED or FAILED, further transitions
    /// are ignored and the returned event reports no change.
    pub fn transition_to(&mut self, new_stage: AnalysisStage) -> StageTransition {
        let old_stage = self.stage;
        if !old_stage.is_terminal() {
            self.stage = new_stage;
            if new_stage.is_terminal() {
                self.ended_at = Some(Utc::now());
            }
        }

        StageTransition {
            analysis_id: self.analysis_id,
            old_stage,
            new_stage: self.stage,
            transitioned_at: Utc::now(),
        }
    }

    /// Milliseconds since the run started
    pub fn elapsed_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        end.signed_duration_since(self.started_at).num_milliseconds()
    }
}
