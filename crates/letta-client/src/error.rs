//! Error types for the Letta client.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single call to the agent.
#[derive(Debug, Error)]
pub enum LettaError {
    /// Missing or unusable configuration, detected before any request.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The agent rejected the request with HTTP 422.
    #[error("API validation error from {url}: {body}")]
    Validation { url: String, body: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The caller's cancellation signal fired before the call finished.
    #[error("call cancelled")]
    Cancelled,

    /// The blocking call form could not start its runtime.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Network-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("error communicating with {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("stream from {url} failed: {source}")]
    Stream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A successful reply whose body is not the expected JSON.
    #[error("invalid JSON reply from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A malformed stream frame. Logged and skipped, never returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("skipping malformed frame ({reason}): {line}")]
pub struct DecodeWarning {
    pub line: String,
    pub reason: String,
}

pub type Result<T, E = LettaError> = std::result::Result<T, E>;

impl LettaError {
    /// HTTP status of the failed response, when there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            LettaError::Validation { .. } => Some(StatusCode::UNPROCESSABLE_ENTITY),
            LettaError::Transport(TransportError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Map a non-success response onto the error taxonomy.
pub(crate) fn status_error(url: &str, status: StatusCode, body: String) -> LettaError {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        LettaError::Validation {
            url: url.to_string(),
            body,
        }
    } else {
        TransportError::Status {
            url: url.to_string(),
            status,
            body,
        }
        .into()
    }
}
