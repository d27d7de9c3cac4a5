//! Pipeline orchestration: validate inputs, parse, apply, rejoin.

use crate::apply::{apply_changes, ApplyError};
use crate::parse::{parse_changes, ParseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Empty code input")]
    EmptySource,

    #[error("Empty changes input")]
    EmptyChanges,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Run the full pipeline: parse `changes` and apply them to `source`.
///
/// The source splits on `\n` and rejoins with `\n`, so a trailing newline
/// survives as a final empty segment. Both inputs must be non-blank. On any
/// failure the original text is untouched and only the error is returned.
pub fn process(source: &str, changes: &str) -> Result<String, ProcessError> {
    if source.trim().is_empty() {
        return Err(ProcessError::EmptySource);
    }
    if changes.trim().is_empty() {
        return Err(ProcessError::EmptyChanges);
    }

    let parsed = parse_changes(changes)?;
    let lines: Vec<String> = source.split('\n').map(String::from).collect();
    let patched = apply_changes(lines, &parsed)?;
    Ok(patched.join("\n"))
}

/// Boundary shape of a pipeline run: the serialized form carries exactly
/// one of `processedCode` or `errorMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessOutcome {
    Success {
        #[serde(rename = "processedCode")]
        processed_code: String,
    },
    Failure {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl From<Result<String, ProcessError>> for ProcessOutcome {
    fn from(result: Result<String, ProcessError>) -> Self {
        match result {
            Ok(processed_code) => ProcessOutcome::Success { processed_code },
            Err(error) => ProcessOutcome::Failure {
                error_message: error.to_string(),
            },
        }
    }
}
