//! Wire envelopes.
//!
//! One JSON object per message, in three shapes:
//!
//! ```text
//! Local → Remote   command       {"id": 1, "method": "Network.enable", "params": {...}}
//! Remote → Local   response      {"id": 1, "result": {...}}  or  {"id": 1, "error": {...}}
//! Remote → Local   notification  {"method": "Network.requestWillBeSent", "params": {...}}
//! ```
//!
//! A command without parameters omits `params` entirely rather than sending
//! an empty object.  Incoming messages are classified by the presence of `id`:
//! anything with an id is a response, everything else must carry a method.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::protocol::error::{ProtocolError, ResponseError};
use crate::schema::signature::split_method;

/// An outgoing command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandEnvelope {
    /// Message id allocated by the sending target.
    pub id: u64,
    /// Fully-qualified method name, `"Domain.method"`.
    pub method: String,
    /// Named parameters; `None` means the member is left out of the JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl CommandEnvelope {
    /// Creates a command envelope.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Map<String, Value>>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Serialises the envelope to its JSON text.
    ///
    /// Building a `Value` first keeps this infallible: every key is already a
    /// string and every leaf is already JSON.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Returns the envelope as a JSON object value.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("id".to_string(), Value::from(self.id));
        object.insert("method".to_string(), Value::String(self.method.clone()));
        if let Some(params) = &self.params {
            object.insert("params".to_string(), Value::Object(params.clone()));
        }
        Value::Object(object)
    }
}

/// A message as delivered by a connection: either raw text or an object the
/// transport already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Unparsed JSON text, as read from a socket.
    Text(String),
    /// An already-parsed JSON value.
    Value(Value),
}

impl InboundMessage {
    /// Parses the message into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the text is not valid JSON.
    pub fn into_value(self) -> Result<Value, ProtocolError> {
        match self {
            InboundMessage::Text(text) => {
                serde_json::from_str(&text).map_err(|e| ProtocolError::Malformed {
                    reason: format!("{e}: {text}"),
                })
            }
            InboundMessage::Value(value) => Ok(value),
        }
    }
}

impl From<String> for InboundMessage {
    fn from(text: String) -> Self {
        InboundMessage::Text(text)
    }
}

impl From<&str> for InboundMessage {
    fn from(text: &str) -> Self {
        InboundMessage::Text(text.to_string())
    }
}

impl From<Value> for InboundMessage {
    fn from(value: Value) -> Self {
        InboundMessage::Value(value)
    }
}

/// A response correlated to an earlier command by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<ResponseError>,
}

/// An asynchronously delivered `"Domain.event"` notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEnvelope {
    pub method: String,
    pub params: Option<Map<String, Value>>,
}

impl NotificationEnvelope {
    /// Returns the domain segment of the method (`"Network"`).
    pub fn domain(&self) -> &str {
        split_method(&self.method).0
    }

    /// Returns the event segment of the method (`"requestWillBeSent"`).
    pub fn event_name(&self) -> &str {
        split_method(&self.method).1
    }
}

/// A classified incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    Response(ResponseEnvelope),
    Notification(NotificationEnvelope),
}

impl InboundEnvelope {
    /// Classifies a parsed JSON message.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Malformed`] if the value is not an object, the `id`
    ///   is not a non-negative integer, or `error`/`params` have the wrong shape.
    /// - [`ProtocolError::MissingMethod`] if the message has neither `id` nor a
    ///   string `method`.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let text = value.to_string();
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::Malformed {
                reason: format!("expected a JSON object, got {text}"),
            });
        };

        if let Some(id) = object.remove("id") {
            let id = id.as_u64().ok_or_else(|| ProtocolError::Malformed {
                reason: format!("response id is not an unsigned integer: {text}"),
            })?;
            let error = match object.remove("error") {
                None | Some(Value::Null) => None,
                Some(raw) => Some(serde_json::from_value::<ResponseError>(raw).map_err(|e| {
                    ProtocolError::Malformed {
                        reason: format!("invalid error object ({e}): {text}"),
                    }
                })?),
            };
            return Ok(InboundEnvelope::Response(ResponseEnvelope {
                id,
                result: object.remove("result"),
                error,
            }));
        }

        let Some(Value::String(method)) = object.remove("method") else {
            return Err(ProtocolError::MissingMethod { message: text });
        };
        let params = match object.remove("params") {
            None | Some(Value::Null) => None,
            Some(Value::Object(params)) => Some(params),
            Some(other) => {
                return Err(ProtocolError::Malformed {
                    reason: format!("notification params must be an object, got {other}"),
                })
            }
        };
        Ok(InboundEnvelope::Notification(NotificationEnvelope { method, params }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
