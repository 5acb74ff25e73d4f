//! Call outcomes.
//!
//! Every command a target sends completes exactly once, with one of:
//!
//! - a result object (success),
//! - [`CallError::Remote`]: the remote end answered with an error object,
//! - [`CallError::ConnectionClosed`]: the command never reached the remote end,
//!   or the target went away while it was in flight,
//! - [`CallError::InvalidParameters`] / [`CallError::UnknownCommand`]: the
//!   call was rejected locally and nothing was sent.
//!
//! [`ProtocolResponse`] is the same outcome folded into the two shapes the
//! raw-invoke path hands back.

use inspector_core::{ParameterError, ResponseError, CONNECTION_CLOSED_ERROR_CODE};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// Why a command call failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// The remote end rejected the command.
    #[error("{0}")]
    Remote(ResponseError),

    /// The target had no live connection, or lost it before the reply came.
    #[error("Connection is closed, can't dispatch pending {method}")]
    ConnectionClosed { method: String },

    /// The positional arguments did not match the command signature.
    #[error(transparent)]
    InvalidParameters(#[from] ParameterError),

    /// The domain exists but declares no such command.
    #[error("Protocol Error: unknown command '{method}'")]
    UnknownCommand { method: String },
}

impl CallError {
    /// Builds the error every undeliverable call completes with.
    pub fn connection_closed(method: impl Into<String>) -> Self {
        CallError::ConnectionClosed {
            method: method.into(),
        }
    }

    /// The wire error code, if this error has one.
    ///
    /// Connection-closed errors report the reserved
    /// [`CONNECTION_CLOSED_ERROR_CODE`] so callers can tell "never reached the
    /// remote" apart from remote rejections.  Local validation failures have
    /// no code.
    pub fn code(&self) -> Option<i64> {
        match self {
            CallError::Remote(e) => Some(e.code),
            CallError::ConnectionClosed { .. } => Some(CONNECTION_CLOSED_ERROR_CODE),
            CallError::InvalidParameters(_) | CallError::UnknownCommand { .. } => None,
        }
    }

    /// Returns `true` if the call failed because the connection is gone.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, CallError::ConnectionClosed { .. })
    }

    /// The error as a wire error object.
    pub fn to_response_error(&self) -> ResponseError {
        match self {
            CallError::Remote(e) => e.clone(),
            other => ResponseError::new(other.code().unwrap_or_default(), other.to_string()),
        }
    }
}

/// The outcome of a raw invoke.
///
/// ```rust
/// use inspector_backend::domain::ProtocolResponse;
/// use serde_json::json;
///
/// let response = ProtocolResponse::Success(json!({"body": "<html>"}));
/// assert!(response.is_success());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolResponse {
    /// The full result object.  A reply without `result` yields `{}`.
    Success(Value),
    /// The error message, plus the remote `data` payload for commands
    /// registered with extended error data.
    Failure { message: String, data: Option<Value> },
}

impl ProtocolResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, ProtocolResponse::Success(_))
    }

    /// The error message, if the call failed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ProtocolResponse::Success(_) => None,
            ProtocolResponse::Failure { message, .. } => Some(message),
        }
    }

    /// Converts into a `Result`, keeping only the message on failure.
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            ProtocolResponse::Success(value) => Ok(value),
            ProtocolResponse::Failure { message, .. } => Err(message),
        }
    }
}

/// Adapter for call sites that want a value no matter what.
pub trait CallResultExt<T> {
    /// On failure, logs `prefix` followed by the error and returns
    /// `T::default()`.
    fn or_log_default(self, prefix: &str) -> T;
}

impl<T: Default> CallResultExt<T> for Result<T, CallError> {
    fn or_log_default(self, prefix: &str) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                error!("{prefix}{e}");
                T::default()
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
