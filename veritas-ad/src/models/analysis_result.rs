//! Validated analysis result
//!
//! The only engine-derived value that leaves the service. Instances are
//! built by the result parser after schema validation; nothing from the
//! engine output is passed through unchecked.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict label emitted by a classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    /// Parse an engine label; only the exact spellings are accepted
    pub fn from_engine(value: &str) -> Option<Self> {
        match value {
            "Real" => Some(Label::Real),
            "Fake" => Some(Label::Fake),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Real => f.write_str("Real"),
            Label::Fake => f.write_str("Fake"),
        }
    }
}

/// One classifier's verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVerdict {
    pub label: Label,
    /// Non-empty confidence, e.g. `"92%"` or `"92"`
    pub confidence: String,
}

/// Verdicts from both classifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub cnn: ModelVerdict,
    pub rnn: ModelVerdict,
}
