//! Registration from a JSON protocol description.
//!
//! The description has the standard layout published alongside remote
//! debugging protocols:
//!
//! ```json
//! {"domains": [{
//!     "domain": "Page",
//!     "types":    [{"id": "TransitionType", "type": "string", "enum": ["link", "typed"]}],
//!     "commands": [{"name": "navigate",
//!                   "parameters": [{"name": "url", "type": "string"}],
//!                   "returns":    [{"name": "frameId", "$ref": "FrameId"}]}],
//!     "events":   [{"name": "loadEventFired", "parameters": [{"name": "timestamp", "type": "number"}]}]
//! }]}
//! ```
//!
//! Loading happens in two passes.  The first pass collects every declared
//! type so that a `$ref` in any domain can be resolved to the primitive it
//! stands for; the second pass registers commands, events and enum tables.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::schema::registry::{EnumTable, SchemaRegistry};
use crate::schema::signature::{ParamDescriptor, ParamType};

/// Errors that can occur while loading a protocol description.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The text is not JSON or does not have the description layout.
    #[error("invalid protocol description: {0}")]
    Parse(#[from] serde_json::Error),

    /// A domain, command or event has an empty name.
    #[error("protocol description has an unnamed {kind} in domain '{domain}'")]
    Unnamed { kind: &'static str, domain: String },
}

#[derive(Debug, Deserialize)]
struct ProtocolDescription {
    domains: Vec<DomainDescription>,
}

#[derive(Debug, Deserialize)]
struct DomainDescription {
    domain: String,
    #[serde(default)]
    types: Vec<TypeDescription>,
    #[serde(default)]
    commands: Vec<CommandDescription>,
    #[serde(default)]
    events: Vec<EventDescription>,
}

#[derive(Debug, Deserialize)]
struct TypeDescription {
    id: String,
    #[serde(rename = "type")]
    type_name: Option<String>,
    #[serde(rename = "enum")]
    enum_values: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CommandDescription {
    name: String,
    #[serde(default)]
    parameters: Vec<PropertyDescription>,
    #[serde(default)]
    returns: Vec<PropertyDescription>,
    /// Presence of an `error` member marks commands whose error responses
    /// carry structured `data`.
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EventDescription {
    name: String,
    #[serde(default)]
    parameters: Vec<PropertyDescription>,
}

#[derive(Debug, Deserialize)]
struct PropertyDescription {
    name: String,
    #[serde(rename = "type")]
    type_name: Option<String>,
    #[serde(rename = "$ref")]
    reference: Option<String>,
    #[serde(default)]
    optional: bool,
}

impl SchemaRegistry {
    /// Registers every command, event and enum type in a protocol description.
    ///
    /// Returns the number of domains loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the text cannot be parsed or a member is
    /// unnamed.  Nothing is registered in that case.
    pub fn load_protocol_json(&mut self, text: &str) -> Result<usize, SchemaError> {
        let description: ProtocolDescription = serde_json::from_str(text)?;
        validate_names(&description)?;

        let types = collect_type_primitives(&description);

        for domain in &description.domains {
            for ty in &domain.types {
                if let Some(values) = &ty.enum_values {
                    let table: EnumTable = values.iter().map(|v| (enum_key(v), v.clone())).collect();
                    self.register_enum(&format!("{}.{}", domain.domain, ty.id), table);
                }
            }

            for command in &domain.commands {
                let params = command
                    .parameters
                    .iter()
                    .map(|p| ParamDescriptor {
                        name: p.name.clone(),
                        param_type: resolve_type(p, &domain.domain, &types),
                        optional: p.optional,
                    })
                    .collect();
                let returns = command.returns.iter().map(|r| r.name.clone());
                self.register_command(
                    &format!("{}.{}", domain.domain, command.name),
                    params,
                    returns,
                    command.error.is_some(),
                );
            }

            for event in &domain.events {
                self.register_event(
                    &format!("{}.{}", domain.domain, event.name),
                    event.parameters.iter().map(|p| p.name.clone()),
                );
            }
        }

        debug!(
            domains = description.domains.len(),
            types = types.len(),
            "protocol description loaded"
        );
        Ok(description.domains.len())
    }
}

fn validate_names(description: &ProtocolDescription) -> Result<(), SchemaError> {
    for domain in &description.domains {
        let unnamed = |kind| SchemaError::Unnamed {
            kind,
            domain: domain.domain.clone(),
        };
        if domain.domain.is_empty() {
            return Err(unnamed("domain"));
        }
        if domain.commands.iter().any(|c| c.name.is_empty()) {
            return Err(unnamed("command"));
        }
        if domain.events.iter().any(|e| e.name.is_empty()) {
            return Err(unnamed("event"));
        }
    }
    Ok(())
}

/// Maps `"Domain.TypeId"` to the primitive each declared type is checked as.
fn collect_type_primitives(description: &ProtocolDescription) -> HashMap<String, ParamType> {
    description
        .domains
        .iter()
        .flat_map(|d| {
            d.types.iter().map(move |t| {
                let primitive = t
                    .type_name
                    .as_deref()
                    .and_then(ParamType::from_protocol_type)
                    .unwrap_or(ParamType::Object);
                (format!("{}.{}", d.domain, t.id), primitive)
            })
        })
        .collect()
}

fn resolve_type(
    property: &PropertyDescription,
    domain: &str,
    types: &HashMap<String, ParamType>,
) -> ParamType {
    if let Some(name) = property.type_name.as_deref() {
        return ParamType::from_protocol_type(name).unwrap_or(ParamType::Object);
    }
    let Some(reference) = property.reference.as_deref() else {
        return ParamType::Object;
    };
    let qualified = if reference.contains('.') {
        reference.to_string()
    } else {
        format!("{domain}.{reference}")
    };
    types.get(&qualified).copied().unwrap_or_else(|| {
        debug!(reference = %qualified, "unresolved $ref, checking as object");
        ParamType::Object
    })
}

/// Converts a wire enum value into its symbolic key: `"back-forward"` →
/// `"BackForward"`, `"script_parsed"` → `"ScriptParsed"`.
fn enum_key(value: &str) -> String {
    value
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
