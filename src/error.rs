//! Error types for the SSE trigger engine.
//!
//! Errors fall into a handful of families:
//!
//! | Family | Variants | Handling |
//! |--------|----------|----------|
//! | Transport | [`SseError::Http`], [`SseError::Status`], [`SseError::ContentType`] | `htmx:sseError` notification, retry when the primitive is closed |
//! | Parse | [`SseError::Parse`] | offending node skipped |
//! | Declaration | [`SseError::InvalidSwapStyle`], [`SseError::Url`] | logged, element ignored |
//! | Lifecycle | [`SseError::Detached`] | stale callback, discarded |
//! | Host | [`SseError::Host`] | collaborator failure, collected and logged |
//!
//! None of these ever escape a connection task; see the `engine` module.

use crate::types::ElementId;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SseError>;

/// Errors produced by the engine, the transport primitive and host collaborators.
#[derive(Debug, Error)]
pub enum SseError {
    /// Network level failure reported by the HTTP stack.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The stream endpoint answered with a non-success status.
    #[error("unexpected response status {0}")]
    Status(u16),

    /// The stream endpoint answered with something other than `text/event-stream`.
    #[error("expected text/event-stream, got {0:?}")]
    ContentType(String),

    /// A message payload or stream chunk could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A swap declaration named a style the engine does not know.
    #[error("invalid swap style: {0:?}")]
    InvalidSwapStyle(String),

    /// The element is no longer attached to the document.
    #[error("element {0} is not attached to the document")]
    Detached(ElementId),

    /// A stream source declaration held an unusable URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Failure inside a host collaborator (placement, swap, parsing).
    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

impl SseError {
    /// Whether the error belongs to the transport family.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SseError::Http(_) | SseError::Status(_) | SseError::ContentType(_)
        )
    }

    /// Whether reconnecting could plausibly succeed.
    ///
    /// Client errors other than timeouts and rate limiting are permanent, but
    /// the engine still retries them at the capped backoff; this is only used
    /// to pick the log level.
    pub fn is_retryable(&self) -> bool {
        match self {
            SseError::Http(_) => true,
            SseError::Status(status) => crate::client::is_retryable_status(*status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SseError {
    fn from(err: reqwest::Error) -> Self {
        SseError::Http(err.to_string())
    }
}
