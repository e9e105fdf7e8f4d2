//! Authentication error types.

use cli_storage::StorageError;
use serde_json::{json, Value};
use telemetry::TelemetrySink;
use thiserror::Error;
use tracing::error;

/// Reason a callback request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFailure {
    /// The request line carried no target URL.
    MissingUrl,
    /// The remote auth page reported a failure via the `error` parameter.
    Remote { error: String },
    /// CSRF/code validation failed. All three flags are kept for diagnostics.
    Validation {
        has_csrf_token: bool,
        has_code: bool,
        csrf_token_matches: bool,
    },
    /// The listener itself failed.
    ServerError { reason: String },
}

impl std::fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackFailure::MissingUrl => write!(f, "missing_url"),
            CallbackFailure::Remote { error } => write!(f, "remote error: {}", error),
            CallbackFailure::Validation {
                has_csrf_token,
                has_code,
                csrf_token_matches,
            } => write!(
                f,
                "validation failed (has_csrf_token={}, has_code={}, csrf_token_matches={})",
                has_csrf_token, has_code, csrf_token_matches
            ),
            CallbackFailure::ServerError { reason } => write!(f, "server_error: {}", reason),
        }
    }
}

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed, missing or mismatched callback parameters, or a local
    /// server transport failure. Recoverable by retrying the sign-in.
    #[error("Invalid auth response: {0}")]
    InvalidAuthResponse(CallbackFailure),

    /// A callback request is already pending on this server
    #[error("Authentication already in progress")]
    AuthenticationInProgress,

    /// Exchange response carried no session token
    #[error("Auth response is missing a session token")]
    MissingToken,

    /// Remote response carried no user record
    #[error("Auth response is missing the user record")]
    MissingUser,

    /// The stored session token was rejected as expired or revoked
    #[error("Session token is expired")]
    TokenExpired,

    /// Every port in the probe range was taken
    #[error("No available port in {start_port}..=65535")]
    NoAvailablePort { start_port: u16 },

    /// Invalid state transition in the session FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Remote API failure with an HTTP status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Timed out waiting for the browser callback
    #[error("Timed out waiting for the browser callback")]
    Timeout,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fallback wrapper preserving an unexpected underlying error
    #[error(transparent)]
    Unknown(Box<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
    /// Stable code string for logs and telemetry.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidAuthResponse(_) => "invalid_auth_response",
            AuthError::AuthenticationInProgress => "auth_in_progress",
            AuthError::MissingToken => "missing_token",
            AuthError::MissingUser => "missing_user",
            AuthError::TokenExpired => "token_expired",
            AuthError::NoAvailablePort { .. } => "no_available_port",
            AuthError::InvalidStateTransition(_) => "invalid_state_transition",
            AuthError::Api { .. } => "api_error",
            AuthError::Timeout => "timeout",
            AuthError::Storage(_) => "storage",
            AuthError::Http(_) => "http",
            AuthError::Io(_) => "io",
            AuthError::Json(_) => "json",
            AuthError::InvalidUrl(_) => "invalid_url",
            AuthError::Config(_) => "config",
            AuthError::Unknown(_) => "unknown",
        }
    }

    /// Structured diagnostic payload for telemetry capture.
    pub fn details(&self) -> Value {
        match self {
            AuthError::InvalidAuthResponse(CallbackFailure::Validation {
                has_csrf_token,
                has_code,
                csrf_token_matches,
            }) => json!({
                "has_csrf_token": has_csrf_token,
                "has_code": has_code,
                "csrf_token_matches": csrf_token_matches,
            }),
            AuthError::InvalidAuthResponse(CallbackFailure::Remote { error }) => {
                json!({ "error": error })
            }
            AuthError::InvalidAuthResponse(CallbackFailure::ServerError { reason }) => {
                json!({ "reason": reason })
            }
            AuthError::InvalidAuthResponse(CallbackFailure::MissingUrl) => {
                json!({ "reason": "missing_url" })
            }
            AuthError::NoAvailablePort { start_port } => json!({ "start_port": start_port }),
            AuthError::Api { status, .. } => json!({ "status": status }),
            _ => Value::Null,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

/// Log an auth error and forward it to telemetry, then hand it back so the
/// caller re-throws. This path never swallows an error.
pub fn report_auth_error(telemetry: &dyn TelemetrySink, error: AuthError) -> AuthError {
    error!(code = error.code(), error = %error, "Authentication error");
    telemetry.capture_error(error.code(), &error.to_string(), error.details());
    error
}
