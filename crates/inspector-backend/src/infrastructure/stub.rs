//! A connection that answers every command with a "not implemented" error.
//!
//! Used when there is nothing to connect to: every call still completes
//! exactly once, with the reserved stub error code, so code paths that issue
//! commands keep working.  The reply carries the original command in `data`.

use std::future::{ready, Ready};

use async_trait::async_trait;
use inspector_core::{ResponseError, STUB_ERROR_CODE};
use serde_json::{json, Value};
use tracing::warn;

use crate::infrastructure::connection::{Connection, ConnectionError, ConnectionParams};

/// Message every stub reply carries.
pub const STUB_ERROR_MESSAGE: &str = "This is a stub connection, can't dispatch message.";

/// Connection that rejects every command.
#[derive(Debug)]
pub struct StubConnection {
    params: ConnectionParams,
}

impl StubConnection {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    /// A connection factory producing stub connections.
    pub fn factory(params: ConnectionParams) -> Ready<Result<Box<dyn Connection>, ConnectionError>> {
        ready(Ok(Box::new(StubConnection::new(params))))
    }
}

#[async_trait]
impl Connection for StubConnection {
    fn send_raw_message(&self, message: String) {
        let command: Value = match serde_json::from_str(&message) {
            Ok(command) => command,
            Err(e) => {
                warn!("stub connection received non-JSON message: {e}");
                return;
            }
        };
        let id = command.get("id").cloned().unwrap_or(Value::Null);
        let error = ResponseError::new(STUB_ERROR_CODE, STUB_ERROR_MESSAGE).with_data(command);
        // Queued on the params channel, so the reply is handled on a later
        // turn of the target's message pump.
        self.params.on_message(json!({"id": id, "error": error}));
    }

    async fn disconnect(&self) {}
}

// ── Tests ─────────────────────────────────────────────────────────────────────
