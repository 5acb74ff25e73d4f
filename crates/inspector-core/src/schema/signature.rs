//! Command, event and parameter signatures.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Splits `"Domain.method"` into `("Domain", "method")`.
///
/// A name without a dot is treated as a bare domain with an empty member.
pub fn split_method(method: &str) -> (&str, &str) {
    method.split_once('.').unwrap_or((method, ""))
}

/// The primitive type a positional argument is checked against.
///
/// The checks follow the remote protocol's dynamic typing: `Object` accepts
/// any object, array or `null`, and `Number` accepts integers and floats
/// alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    /// Accepts any JSON value.
    Any,
}

impl ParamType {
    /// Maps a type name from a protocol description onto the checked
    /// primitive.  Returns `None` for names that are not primitives (such as a
    /// `$ref` target).
    pub fn from_protocol_type(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ParamType::String),
            "integer" | "number" => Some(ParamType::Number),
            "boolean" => Some(ParamType::Boolean),
            "object" | "array" => Some(ParamType::Object),
            "any" => Some(ParamType::Any),
            _ => None,
        }
    }

    /// Returns `true` if `value` has this runtime type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object() || value.is_array() || value.is_null(),
            ParamType::Any => true,
        }
    }

    /// The lowercase name used in error messages and schema files.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Any => "any",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the runtime type name of a value, in the same vocabulary as
/// [`ParamType::as_str`].
pub fn runtime_type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
    }
}

/// One declared parameter of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub optional: bool,
}

impl ParamDescriptor {
    /// A parameter that must always be supplied.
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: false,
        }
    }

    /// A parameter that may be left undefined.
    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: true,
        }
    }
}

/// The registered shape of one command.
///
/// Immutable once stored in a registry; re-registering the same method
/// replaces the whole signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSignature {
    /// Fully-qualified method name, `"Domain.method"`.
    pub method: String,
    /// Declared parameters, in positional order.
    pub params: Vec<ParamDescriptor>,
    /// Declared reply field names, in order.
    pub reply_args: Vec<String>,
    /// Whether error responses carry a meaningful `data` payload.
    pub has_error_data: bool,
}

impl CommandSignature {
    /// The reply field a positional call settles to: the first declared one.
    pub fn primary_reply_field(&self) -> Option<&str> {
        self.reply_args.first().map(String::as_str)
    }
}

/// The registered shape of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    /// Fully-qualified event name, `"Domain.event"`.
    pub method: String,
    /// Parameter field names; their order defines the positional arguments
    /// handed to event handlers.
    pub params: Vec<String>,
}
