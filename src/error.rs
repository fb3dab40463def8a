/// Failure taxonomy for corpus construction and evaluation.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline conditions.  These travel inside `anyhow::Error` and can
/// be recovered with `downcast_ref`.
#[derive(Debug, Error)]
pub enum PipelineError {
  /// Duplicate index keys, mismatched parallel outputs, or a corpus file
  /// whose line count disagrees with the review data.
  #[error("integrity violation: {0}")]
  Integrity(String),

  /// The reference search service answered with a non-success status.
  #[error("reference service error ({status}): {body}")]
  ExternalService { status: u16, body: String },

  /// A required input (dataset path, credential) is missing.
  #[error("missing {what}: {detail}")]
  ConfigurationAbsence { what: &'static str, detail: String },

  /// A record line could not be parsed.
  #[error("cannot parse record at {path:?} line {line}: {source}")]
  StreamParse {
    path: PathBuf,
    line: usize,
    #[source]
    source: serde_json::Error,
  },
}

impl PipelineError {
  pub fn integrity<S: Into<String>>(msg: S) -> PipelineError {
    PipelineError::Integrity(msg.into())
  }
}
