//! Error types for the session middleware.

use axum::{
    Json,
    http::{StatusCode, header::InvalidHeaderValue},
    response::{IntoResponse, Response},
};
use rill_session_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tower::BoxError;

/// Session middleware error type.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The cache backend failed a read or write.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A session payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A transfer POST body was not a JSON object.
    #[error("Invalid transfer body: {0}")]
    InvalidTransferBody(String),

    /// A transfer POST body had no usable `id` field.
    #[error("Transfer body is missing a session id")]
    MissingTransferId,

    /// The request body could not be read.
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    /// A generated header value was not valid.
    #[error("Invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            SessionError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            SessionError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            SessionError::InvalidTransferBody(_) => (StatusCode::BAD_REQUEST, "invalid_body"),
            SessionError::MissingTransferId => (StatusCode::BAD_REQUEST, "missing_id"),
            SessionError::BodyRead(_) => (StatusCode::BAD_REQUEST, "body_read_error"),
            SessionError::Header(_) => (StatusCode::INTERNAL_SERVER_ERROR, "header_error"),
        };

        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Session error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Rejected session request");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Outcome of a failed request passing through the middleware.
///
/// Keeps the middleware's own failures apart from the downstream handler's,
/// so the handler's error reaches the caller as the same value it raised.
#[derive(Debug)]
pub enum HandleError<E> {
    /// Loading, saving or the transfer endpoint failed.
    Session(SessionError),
    /// The downstream handler failed.
    Downstream(E),
}

impl<E> HandleError<E> {
    /// Flatten into a boxed error, as tower services report them.
    pub fn into_boxed(self) -> BoxError
    where
        E: Into<BoxError>,
    {
        match self {
            HandleError::Session(e) => Box::new(e),
            HandleError::Downstream(e) => e.into(),
        }
    }
}

impl<E> From<SessionError> for HandleError<E> {
    fn from(e: SessionError) -> Self {
        HandleError::Session(e)
    }
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
