//! Message observers: a tap on everything a target sends and receives.
//!
//! Observers are for tooling (protocol monitors, traffic recorders, test doubles).
//! They see every outbound command after it is handed to the connection and
//! every inbound message after it is parsed, before it is routed.

use serde_json::{Map, Value};

/// A command as seen by observers.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub domain: String,
    pub method: String,
    /// A copy of the parameter object, if any was sent.
    pub params: Option<Map<String, Value>>,
    pub id: u64,
}

/// Receives a copy of every message a target exchanges.
///
/// Both methods default to doing nothing, so an observer only implements the
/// direction it cares about.
pub trait MessageObserver: Send + Sync {
    fn message_sent(&self, _message: &SentMessage) {}

    fn message_received(&self, _message: &Value) {}
}

// ── Tests ─────────────────────────────────────────────────────────────────────
