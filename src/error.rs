//! The error taxonomy shared by every CORE component.
//!
//! A single sum type travels bottom-up instead of per-module exceptions, per
//! the Design Notes' "Result type" guidance. `anyhow` is reserved for the
//! composition root (`session.rs`) and the CLI entry point, the same split
//! the teacher crate draws between its `network.rs` (`anyhow!(e)` at the
//! call site) and a narrower domain error a library module would expose.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Decoding, signature, or protocol conformance failed.
    #[error("bad message: {0}")]
    BadMessage(String),

    /// Caller-supplied data is ill-formed (bad URL, target track not in context, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires an authenticated session and there is none.
    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// Transient upstream failure (non-2xx, DNS, connect).
    #[error("try again: {0}")]
    TryAgain(String),

    /// Feature reachable but not implemented.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Requested traversal step has no result (end of context).
    #[error("no message")]
    NoMessage,

    /// Raw socket failure.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn bad_message(msg: impl Into<String>) -> Self {
        Self::BadMessage(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_permitted(msg: impl Into<String>) -> Self {
        Self::NotPermitted(msg.into())
    }

    pub fn try_again(msg: impl Into<String>) -> Self {
        Self::TryAgain(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// True for failures worth an idempotent retry (endpoint refetch, token refresh, putState).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TryAgain(_))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::TryAgain(e.to_string())
        } else {
            Self::BadMessage(e.to_string())
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CoreError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::IoError(std::io::Error::other(e.to_string()))
    }
}
