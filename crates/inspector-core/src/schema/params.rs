//! Positional argument handling for commands and events.
//!
//! Commands are called positionally (`getResponseBody(requestId)`) but sent
//! with named parameters (`{"requestId": "..."}`).  Events travel the other
//! way: they arrive with named parameters and are handed to handlers
//! positionally.  Both directions are driven by the declared order in the
//! registered signature.
//!
//! A positional slot can be *undefined* (`None`), which is distinct from JSON
//! `null`: an undefined optional argument is left out of the parameter
//! object, while `null` is a value like any other.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::signature::{runtime_type_name, EventSignature, ParamDescriptor};

/// Errors raised while mapping positional arguments onto a signature.
///
/// Any of these stops the call before an envelope is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// A required parameter had no corresponding argument.
    #[error(
        "Protocol Error: Invalid number of arguments for method '{method}' call. \
         It must have the following arguments [{signature}]."
    )]
    WrongArity { method: String, signature: String },

    /// An argument's runtime type did not match the declared primitive.
    #[error(
        "Protocol Error: Invalid type of argument '{param}' for method '{method}' call. \
         It must be '{expected}' but it is '{actual}'."
    )]
    WrongType {
        method: String,
        param: String,
        expected: String,
        actual: String,
    },

    /// Arguments were left over after every declared parameter was consumed.
    #[error("Protocol Error: Extra {count} arguments in a call to method '{method}'.")]
    TooManyArguments { method: String, count: usize },
}

/// Positional arguments for a command call.
///
/// ```rust
/// use inspector_core::CallArgs;
///
/// let args = CallArgs::new().with("request-1").undefined().with(true);
/// assert_eq!(args.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs(Vec<Option<Value>>);

impl CallArgs {
    /// An empty argument list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a defined argument.
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.0.push(Some(value.into()));
        self
    }

    /// Appends an undefined argument (skips an optional parameter).
    pub fn undefined(mut self) -> Self {
        self.0.push(None);
        self
    }

    /// Number of positional slots, defined or not.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for CallArgs {
    fn from(values: Vec<Value>) -> Self {
        Self(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<Value>>> for CallArgs {
    fn from(values: Vec<Option<Value>>) -> Self {
        Self(values)
    }
}

/// Builds the named parameter object for a command call.
///
/// Walks `signature` in order.  A required parameter with no argument left is
/// an arity error; an optional parameter whose argument is undefined is
/// skipped; a type mismatch is a type error.  Leftover arguments after the
/// walk are rejected too.
///
/// Returns `Ok(None)` when no parameter ended up in the object, so the
/// envelope omits `params` entirely.
///
/// # Errors
///
/// Returns the first [`ParameterError`] encountered.
pub fn prepare_parameters(
    method: &str,
    signature: &[ParamDescriptor],
    args: CallArgs,
) -> Result<Option<Map<String, Value>>, ParameterError> {
    let mut params = Map::new();
    let mut remaining = args.0.into_iter();

    for param in signature {
        let Some(slot) = remaining.next() else {
            if param.optional {
                continue;
            }
            return Err(ParameterError::WrongArity {
                method: method.to_string(),
                signature: describe_signature(signature),
            });
        };

        let value = match slot {
            None if param.optional => continue,
            None => {
                return Err(ParameterError::WrongType {
                    method: method.to_string(),
                    param: param.name.clone(),
                    expected: param.param_type.to_string(),
                    actual: "undefined".to_string(),
                })
            }
            Some(value) => value,
        };

        if !param.param_type.matches(&value) {
            return Err(ParameterError::WrongType {
                method: method.to_string(),
                param: param.name.clone(),
                expected: param.param_type.to_string(),
                actual: runtime_type_name(&value).to_string(),
            });
        }

        params.insert(param.name.clone(), value);
    }

    let extra = remaining.count();
    if extra > 0 {
        return Err(ParameterError::TooManyArguments {
            method: method.to_string(),
            count: extra,
        });
    }

    Ok(if params.is_empty() { None } else { Some(params) })
}

fn describe_signature(signature: &[ParamDescriptor]) -> String {
    signature
        .iter()
        .map(|p| {
            let marker = if p.optional { "?" } else { "" };
            format!("{}{marker}: {}", p.name, p.param_type)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Positional arguments handed to an event handler.
///
/// One slot per declared field, in schema order.  A field missing from the
/// notification is an undefined slot, so handlers always see the declared
/// arity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventArgs(Vec<Option<Value>>);

impl EventArgs {
    /// The argument at `index`, or `None` if it was undefined or out of range.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index).and_then(Option::as_ref)
    }

    /// Number of positional slots.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the event declares no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the slots in order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Value>> {
        self.0.iter().map(Option::as_ref)
    }

    /// Consumes the arguments and returns the raw slots.
    pub fn into_inner(self) -> Vec<Option<Value>> {
        self.0
    }
}

impl From<Vec<Option<Value>>> for EventArgs {
    fn from(values: Vec<Option<Value>>) -> Self {
        Self(values)
    }
}

/// Maps a notification's named parameters onto positional handler arguments.
///
/// The notification payload is only read, never modified.
pub fn build_event_args(signature: &EventSignature, params: Option<&Map<String, Value>>) -> EventArgs {
    EventArgs(
        signature
            .params
            .iter()
            .map(|field| params.and_then(|p| p.get(field)).cloned())
            .collect(),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
