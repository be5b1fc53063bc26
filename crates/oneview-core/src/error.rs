//! Error types for OneView operations.
//!
//! This module provides the error type shared by the resource client, the task monitor
//! and the HTTP transport, including HTTP status code mapping for appliance responses.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Main error type for OneView operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A required argument was missing or empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The URI does not belong to the resource's base path
    #[error("Unrecognized URI for this resource: {0}")]
    UnrecognizedUri(String),

    /// The appliance reported a failed asynchronous task
    #[error("Task failed: {message}")]
    TaskError {
        /// First error message reported by the task
        message: String,
        /// Error code of the first task error, if any
        error_code: Option<String>,
        /// The task's `taskErrors` payload, unchanged
        errors: Value,
    },

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Response body could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Appliance is unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request with details
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication or authorization failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for OneView operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds an [`Error::InvalidArgument`] naming the offending argument.
    #[must_use]
    pub fn invalid_argument(name: &str) -> Self {
        Self::InvalidArgument(format!("`{name}` is required and must not be empty"))
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::UnrecognizedUri(_) => "UNRECOGNIZED_URI",
            Self::TaskError { .. } => "TASK_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::InvalidResponse(_) | Self::ServiceUnavailable(_)
        )
    }

    /// Returns true if the transport may retry the request that produced this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::ServiceUnavailable(_) | Self::HttpError(_)
        )
    }
}

/// Maps a non-success appliance response to an [`Error`].
///
/// Appliance error bodies are JSON documents carrying `errorCode` and `message`; when
/// present they replace the raw body in the error text.
#[must_use]
pub fn map_status_to_error(status: StatusCode, text: &str) -> Error {
    let detail = appliance_message(text).unwrap_or_else(|| text.to_string());
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        StatusCode::BAD_REQUEST => Error::BadRequest(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Unauthorized(format!("OneView authentication failed: {detail}"))
        }
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => Error::Conflict(detail),
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("OneView temporarily unavailable: {detail}"))
        }
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("OneView server error {status}: {detail}"))
        }
        _ => Error::HttpError(format!("OneView error {status}: {detail}")),
    }
}

fn appliance_message(text: &str) -> Option<String> {
    let body: Value = serde_json::from_str(text).ok()?;
    let message = body.get("message")?.as_str()?;
    match body.get("errorCode").and_then(Value::as_str) {
        Some(code) => Some(format!("{code}: {message}")),
        None => Some(message.to_string()),
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
