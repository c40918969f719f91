//! Error kinds carried through the sync core (§7) and their HTTP surface.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// The closed set of failure categories from §7. Not language-specific type names —
/// this enum *is* the taxonomy the spec describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("network error")]
    Network,
    #[error("timeout")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("authentication failure")]
    Auth,
    #[error("remote validation failure")]
    RemoteValidation,
    #[error("conflict")]
    ConflictExists,
    #[error("busy")]
    Busy,
    #[error("cancelled")]
    Cancelled,
    #[error("sync timed out")]
    SyncTimedOut,
    #[error("naive/aware timestamp mismatch")]
    TzMismatch,
    #[error("circuit open")]
    CircuitOpen,
}

impl ErrorKind {
    /// §7 retry policy: whether this kind is retryable at the API-client layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimited)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Network | ErrorKind::Timeout => StatusCode::BAD_GATEWAY,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::RemoteValidation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ConflictExists => StatusCode::CONFLICT,
            ErrorKind::Busy => StatusCode::CONFLICT,
            ErrorKind::Cancelled => StatusCode::GONE,
            ErrorKind::SyncTimedOut => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::TzMismatch => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Application-level error, carrying a kind plus a human-readable message. Implements
/// `IntoResponse` the way the teacher's `utils/response.rs::AppError` does.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    /// Server-dictated backoff from a `Retry-After` header (§4.2), honored verbatim
    /// instead of the computed exponential delay when present.
    pub retry_after: Option<Duration>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::new(ErrorKind::Network, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Network
        };
        AppError::new(kind, err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ErrorKind {
    fn code(&self) -> &'static str {
        match self {
            ErrorKind::Network => "NETWORK",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::Auth => "AUTH",
            ErrorKind::RemoteValidation => "REMOTE_VALIDATION",
            ErrorKind::ConflictExists => "CONFLICT_EXISTS",
            ErrorKind::Busy => "BUSY",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::SyncTimedOut => "SYNC_TIMED_OUT",
            ErrorKind::TzMismatch => "TZ_MISMATCH",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();
        let body = ErrorBody {
            code: self.kind.code(),
            message: self.message,
        };
        (status, Json(body)).into_response()
    }
}
