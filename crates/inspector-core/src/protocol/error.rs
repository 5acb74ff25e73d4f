//! Error objects carried on the wire and the protocol-violation taxonomy.
//!
//! Two very different kinds of "error" live here:
//!
//! - [`ResponseError`] is *data*: the `error` member of a response envelope,
//!   sent by the remote end when it rejects a command.  It is delivered to the
//!   caller through the normal completion path.
//! - [`ProtocolError`] is a *diagnosis*: something on the wire did not make
//!   sense (an id nobody is waiting for, an event nobody declared).  It is
//!   logged by the receiving target and never propagated as a panic or a
//!   failed call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Reserved code for the error synthesised locally when a command can no
/// longer reach the remote end (the connection is gone).
pub const CONNECTION_CLOSED_ERROR_CODE: i64 = -32000;

/// Reserved code used by stub connections that answer every command with a
/// "not implemented" error.
pub const STUB_ERROR_CODE: i64 = -32015;

/// The `error` member of a response envelope.
///
/// ```json
/// {"id": 7, "error": {"code": -32601, "message": "'Foo.bar' wasn't found"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct ResponseError {
    /// Numeric error code chosen by the remote end.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
    /// Optional structured payload attached to the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    /// Creates an error object with no `data` payload.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches a structured `data` payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns `true` for codes that are expected during normal operation and
    /// therefore never logged as request failures: the connection-closed code
    /// and the stub code.
    pub fn is_benign(&self) -> bool {
        self.code == CONNECTION_CLOSED_ERROR_CODE || self.code == STUB_ERROR_CODE
    }
}

/// Malformed or unexpected wire content.
///
/// Every variant carries enough context to produce one self-contained log
/// line.  None of them is fatal to the target that observed it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// The raw text was not JSON, or the JSON did not have the envelope shape.
    #[error("Protocol Error: malformed message: {reason}")]
    Malformed { reason: String },

    /// A message with neither `id` nor `method`.
    #[error("Protocol Error: the message without method: {message}")]
    MissingMethod { message: String },

    /// A response whose id was never handed out while the target was active.
    #[error("Protocol Error: the message with wrong id: {message}")]
    UnknownResponseId { id: u64, message: String },

    /// A response for an id that was issued but has already been completed.
    #[error("Protocol Error: duplicate response for already completed id {id}: {message}")]
    DuplicateResponse { id: u64, message: String },

    /// A response that reached the target after it had been disposed.  Its
    /// caller was already failed with a connection-closed error.
    #[error("response with id {id} arrived after the target was disposed")]
    ResponseAfterDisposal { id: u64 },

    /// A notification for a domain with no registered events.
    #[error("Protocol Error: the message {method} is for non-existing domain '{domain}': {message}")]
    UnknownDomain {
        method: String,
        domain: String,
        message: String,
    },

    /// A notification for a known domain whose event name was never registered.
    #[error("Protocol Error: Attempted to dispatch an unspecified method '{method}': {message}")]
    UnregisteredEvent { method: String, message: String },
}

impl ProtocolError {
    /// Returns `true` if the condition is expected and only worth a debug log.
    pub fn is_benign(&self) -> bool {
        matches!(self, ProtocolError::ResponseAfterDisposal { .. })
    }
}
