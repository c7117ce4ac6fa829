//! Engine output parsing and validation
//!
//! Contract with the engine: any number of diagnostic lines, then exactly
//! one final line holding a JSON object:
//!
//! ```text
//! loading model...
//! {"cnn":{"label":"Real","confidence":"92%"},"rnn":{"label":"Real","confidence":"88%"}}
//! ```
//!
//! Only the last non-empty line is considered. The engine signals its own
//! failures with a final `Error: <message>` line (exit status 0), which is
//! reported separately from a malformed payload.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{AnalysisResult, Label, ModelVerdict};

/// Prefix of an engine-reported failure line
const ENGINE_ERROR_PREFIX: &str = "Error:";

/// Schema problems in an otherwise well-formed payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{0}` is not an object")]
    NotAnObject(String),

    #[error("`{model}.label` is {label}, expected \"Real\" or \"Fake\"")]
    InvalidLabel { model: String, label: String },

    #[error("`{model}.confidence` is empty")]
    EmptyConfidence { model: String },

    #[error("`{model}.confidence` is invalid: {value}")]
    InvalidConfidence { model: String, value: String },
}

/// Parse errors
#[derive(Debug, Error)]
pub enum ParseError {
    /// Output had no non-empty line
    #[error("Analysis engine produced no result line")]
    EmptyOutput,

    /// Final line is not a JSON object
    #[error("Result line is not a valid JSON object: {0}")]
    Malformed(String),

    /// Final line is JSON but does not match the result schema
    #[error("Result failed schema validation: {0}")]
    Schema(#[from] SchemaViolation),

    /// Engine printed an `Error:` line as its result
    #[error("Analysis engine reported an error: {0}")]
    EngineReported(String),
}

/// Extract and validate the result from raw engine stdout
pub fn parse_engine_output(raw: &str) -> Result<AnalysisResult, ParseError> {
    let line = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or(ParseError::EmptyOutput)?;

    if let Some(message) = line.strip_prefix(ENGINE_ERROR_PREFIX) {
        return Err(ParseError::EngineReported(message.trim().to_string()));
    }

    let value: Value = serde_json::from_str(line).map_err(|e| {
        if line.starts_with("{'") {
            ParseError::Malformed(format!("{} (Python dict repr; the engine must print JSON)", e))
        } else {
            ParseError::Malformed(e.to_string())
        }
    })?;
    let root = value
        .as_object()
        .ok_or_else(|| ParseError::Malformed(format!("expected an object, found {}", json_type(&value))))?;

    Ok(AnalysisResult {
        cnn: parse_verdict(root, "cnn")?,
        rnn: parse_verdict(root, "rnn")?,
    })
}

fn parse_verdict(root: &Map<String, Value>, model: &str) -> Result<ModelVerdict, SchemaViolation> {
    let entry = root
        .get(model)
        .ok_or_else(|| SchemaViolation::MissingField(model.to_string()))?
        .as_object()
        .ok_or_else(|| SchemaViolation::NotAnObject(model.to_string()))?;

    let label = match entry.get("label") {
        None | Some(Value::Null) => return Err(SchemaViolation::MissingField(format!("{}.label", model))),
        Some(Value::String(s)) => Label::from_engine(s).ok_or_else(|| SchemaViolation::InvalidLabel {
            model: model.to_string(),
            label: Value::String(s.clone()).to_string(),
        })?,
        Some(other) => {
            return Err(SchemaViolation::InvalidLabel {
                model: model.to_string(),
                label: other.to_string(),
            })
        }
    };

    let confidence = match entry.get("confidence") {
        None | Some(Value::Null) => {
            return Err(SchemaViolation::MissingField(format!("{}.confidence", model)))
        }
        Some(value) => normalize_confidence(model, value)?,
    };

    Ok(ModelVerdict { label, confidence })
}

/// Accept a non-empty string, or a finite number within 0..=100
fn normalize_confidence(model: &str, value: &Value) -> Result<String, SchemaViolation> {
    let invalid = || SchemaViolation::InvalidConfidence {
        model: model.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(SchemaViolation::EmptyConfidence {
                    model: model.to_string(),
                })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Value::Number(n) => {
            let f = n.as_f64().ok_or_else(invalid)?;
            if !f.is_finite() || !(0.0..=100.0).contains(&f) {
                return Err(invalid());
            }
            // Integers keep their integer spelling
            Ok(n.to_string())
        }
        _ => Err(invalid()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
