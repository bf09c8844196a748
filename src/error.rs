//! Error types shared by the whole data-access layer.
//!
//! Precondition failures surface as `Error::InvalidState` from the synchronous
//! part of a call, before any request is issued. Transport failures surface as
//! `Error::RequestFailed` from the pending future.

use serde_json::Value;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  /// A precondition of the call was not met (missing identity, missing parent key).
  #[error("invalid state: {0}")]
  InvalidState(String),

  /// The transport reported a failure (non-2xx status or network error).
  #[error(transparent)]
  RequestFailed(#[from] RequestFailure),

  /// The response body had a shape we cannot materialize.
  #[error("failed to decode response: {0}")]
  Decode(String),
}

impl Error {
  pub fn invalid_state(message: impl Into<String>) -> Self {
    Self::InvalidState(message.into())
  }

  pub fn is_invalid_state(&self) -> bool {
    matches!(self, Self::InvalidState(_))
  }

  /// The transport failure, if this error came from the network.
  pub fn request_failure(&self) -> Option<&RequestFailure> {
    match self {
      Self::RequestFailed(failure) => Some(failure),
      _ => None,
    }
  }
}

/// Failure payload handed back by a transport.
///
/// `status` is `None` when no HTTP response was received at all.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct RequestFailure {
  pub status: Option<u16>,
  pub message: String,
  /// Structured error body returned by the server, when it was JSON.
  pub body: Option<Value>,
}

impl RequestFailure {
  /// Failure for a response with a non-success status.
  pub fn status(status: u16, body: Option<Value>) -> Self {
    Self {
      status: Some(status),
      message: format!("request failed with status {}", status),
      body,
    }
  }

  /// Failure where no response was received.
  pub fn network(message: impl Into<String>) -> Self {
    Self {
      status: None,
      message: message.into(),
      body: None,
    }
  }
}

/// Errors raised by persistent key-value storage backends.
///
/// These never escape the record cache; they are logged and turned into misses.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage unavailable: {0}")]
  Unavailable(String),

  #[error("storage lock poisoned")]
  Poisoned,

  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_status_failure_message() {
    let failure = RequestFailure::status(422, Some(json!({ "errors": ["name taken"] })));
    assert_eq!(failure.status, Some(422));
    assert_eq!(failure.to_string(), "request failed with status 422");
  }

  #[test]
  fn test_request_failure_lookup() {
    let err: Error = RequestFailure::network("connection refused").into();
    assert!(!err.is_invalid_state());
    assert_eq!(err.request_failure().and_then(|f| f.status), None);

    let err = Error::invalid_state("no primary key");
    assert!(err.is_invalid_state());
    assert!(err.request_failure().is_none());
  }
}
