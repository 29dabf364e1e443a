use std::time::Duration;
use thiserror::Error;

/// Errors produced by the manager, its loaders and its backends.
///
/// Failures of a validated chat call are not represented here; they are
/// returned as [`ChatFailure`](crate::types::ChatFailure) records.
#[derive(Error, Debug)]
pub enum AiError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing a prompt, schema or audio file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration detected while loading or building.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A formal schema failed structural validation at registration time.
    #[error("Invalid schema '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },

    /// Caller-supplied input was unusable (missing audio file, empty audio, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The configured backend does not implement the requested operation.
    #[error("Backend '{backend}' does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for AiError {
    fn from(err: anyhow::Error) -> Self {
        AiError::Other(err.to_string())
    }
}

impl From<figment::Error> for AiError {
    fn from(err: figment::Error) -> Self {
        AiError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AiError>;
