//! Error taxonomy for directory lookups.
//!
//! Transport failures of any shape are mapped onto a small, stable set of
//! codes. Structured HTTP status wins; substring matching on the message is
//! the last resort and only best-effort.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Failure reported by a [`Directory`](super::Directory) implementation.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
  /// The request never got a response
  #[error("network request failed: {0}")]
  Transport(String),
  /// The directory answered with a non-success status
  #[error("directory returned {status}: {message}")]
  Status { status: u16, message: String },
  #[error("{0}")]
  Other(String),
}

/// Closed set of error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchErrorCode {
  InvalidQuery,
  NetworkError,
  Unauthorized,
  SearchFailed,
}

impl SearchErrorCode {
  fn user_message(&self) -> &'static str {
    match self {
      SearchErrorCode::InvalidQuery => "Search query must be at least 2 characters",
      SearchErrorCode::NetworkError => "Unable to reach the directory, check your connection",
      SearchErrorCode::Unauthorized => "Your session has expired, sign in again",
      SearchErrorCode::SearchFailed => "Search failed, try again later",
    }
  }
}

/// The single structured shape every lookup failure takes.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct SearchError {
  pub code: SearchErrorCode,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<Value>,
}

impl SearchError {
  pub fn new(code: SearchErrorCode, message: impl Into<String>) -> Self {
    Self {
      code,
      message: message.into(),
      details: None,
    }
  }

  pub fn with_details(mut self, details: Value) -> Self {
    self.details = Some(details);
    self
  }

  pub fn invalid_query(message: impl Into<String>) -> Self {
    Self::new(SearchErrorCode::InvalidQuery, message)
  }
}

/// Message fragments checked in order when no status code is available.
const MESSAGE_PATTERNS: &[(&str, SearchErrorCode)] = &[
  ("unauthorized", SearchErrorCode::Unauthorized),
  ("forbidden", SearchErrorCode::Unauthorized),
  ("session expired", SearchErrorCode::Unauthorized),
  ("401", SearchErrorCode::Unauthorized),
  ("invalid query", SearchErrorCode::InvalidQuery),
  ("too short", SearchErrorCode::InvalidQuery),
  ("network", SearchErrorCode::NetworkError),
  ("fetch", SearchErrorCode::NetworkError),
  ("timeout", SearchErrorCode::NetworkError),
  ("timed out", SearchErrorCode::NetworkError),
  ("connection", SearchErrorCode::NetworkError),
];

/// Map free text onto a code. Unknown text is `SearchFailed`.
pub fn classify_message(message: &str) -> SearchErrorCode {
  let lower = message.to_lowercase();
  MESSAGE_PATTERNS
    .iter()
    .find(|(needle, _)| lower.contains(needle))
    .map(|(_, code)| *code)
    .unwrap_or(SearchErrorCode::SearchFailed)
}

fn classify_status(status: u16) -> Option<SearchErrorCode> {
  match status {
    401 | 403 => Some(SearchErrorCode::Unauthorized),
    400 | 422 => Some(SearchErrorCode::InvalidQuery),
    408 | 502 | 503 | 504 => Some(SearchErrorCode::NetworkError),
    _ => None,
  }
}

/// Translate a directory failure into the caller-facing error.
pub fn classify(err: &DirectoryError) -> SearchError {
  let (code, details) = match err {
    DirectoryError::Transport(_) => (SearchErrorCode::NetworkError, json!({ "cause": err.to_string() })),
    DirectoryError::Status { status, message } => (
      classify_status(*status).unwrap_or_else(|| classify_message(message)),
      json!({ "status": status, "cause": message }),
    ),
    DirectoryError::Other(message) => (classify_message(message), json!({ "cause": message })),
  };

  SearchError::new(code, code.user_message()).with_details(details)
}
