//! The schema registry: every command, event and enum table a protocol
//! declares, grouped by domain.
//!
//! # For beginners
//!
//! The registry is plain data.  It is filled once at startup (either by hand
//! through [`SchemaRegistry::register_command`] and friends, or from a protocol
//! description via [`SchemaRegistry::load_protocol_json`]), then wrapped in an
//! `Arc` and handed to every target.  Registration needs `&mut self`, so once
//! the registry is shared nobody can change it: the borrow checker enforces
//! the "populate first, read concurrently afterwards" rule for us.
//!
//! [`SchemaRegistry::load_protocol_json`]: crate::SchemaRegistry::load_protocol_json

use std::collections::{BTreeMap, HashMap};

use crate::schema::signature::{split_method, CommandSignature, EventSignature, ParamDescriptor};

/// A constant table of enum values, keyed by symbolic name.
///
/// ```rust
/// use inspector_core::EnumTable;
///
/// let table = EnumTable::from_iter([("Document", "document"), ("Script", "script")]);
/// assert_eq!(table.get("Script"), Some("script"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumTable(BTreeMap<String, String>);

impl EnumTable {
    /// Looks up the wire value for a symbolic key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns `true` if `value` is one of the table's wire values.
    pub fn contains_value(&self, value: &str) -> bool {
        self.0.values().any(|v| v == value)
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnumTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The registered commands of one domain.
#[derive(Debug, Clone, Default)]
pub struct AgentSchema {
    domain: String,
    /// Keyed by the short command name (`"enable"`, not `"Network.enable"`).
    commands: HashMap<String, CommandSignature>,
}

impl AgentSchema {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            commands: HashMap::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Looks up a command by its short name.
    pub fn command(&self, name: &str) -> Option<&CommandSignature> {
        self.commands.get(name)
    }

    /// Iterates over the domain's commands in no particular order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandSignature> {
        self.commands.values()
    }
}

/// The registered events of one domain.
#[derive(Debug, Clone, Default)]
pub struct DispatcherSchema {
    domain: String,
    /// Keyed by the fully-qualified event name, as it appears on the wire.
    events: HashMap<String, EventSignature>,
}

impl DispatcherSchema {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            events: HashMap::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Looks up an event by its fully-qualified name (`"Foo.barHappened"`).
    pub fn event(&self, method: &str) -> Option<&EventSignature> {
        self.events.get(method)
    }

    /// Iterates over the domain's events in no particular order.
    pub fn events(&self) -> impl Iterator<Item = &EventSignature> {
        self.events.values()
    }
}

/// Process-wide schema store.
///
/// Domains are created lazily the first time a command, event or enum names
/// them.  Entries are never removed; registering the same name twice replaces
/// the earlier entry.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    agents: BTreeMap<String, AgentSchema>,
    dispatchers: BTreeMap<String, DispatcherSchema>,
    /// domain → enum name → table
    enums: BTreeMap<String, BTreeMap<String, EnumTable>>,
    initialized: bool,
}

impl SchemaRegistry {
    /// Creates an empty, uninitialised registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the signature of `"Domain.method"`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use inspector_core::{ParamDescriptor, ParamType, SchemaRegistry};
    ///
    /// let mut registry = SchemaRegistry::new();
    /// registry.register_command(
    ///     "Network.getResponseBody",
    ///     vec![ParamDescriptor::required("requestId", ParamType::String)],
    ///     ["body", "base64Encoded"],
    ///     false,
    /// );
    /// assert!(registry.command("Network.getResponseBody").is_some());
    /// ```
    pub fn register_command<I, S>(
        &mut self,
        method: &str,
        params: Vec<ParamDescriptor>,
        reply_args: I,
        has_error_data: bool,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (domain, name) = split_method(method);
        let signature = CommandSignature {
            method: method.to_string(),
            params,
            reply_args: reply_args.into_iter().map(Into::into).collect(),
            has_error_data,
        };
        self.agents
            .entry(domain.to_string())
            .or_insert_with(|| AgentSchema::new(domain))
            .commands
            .insert(name.to_string(), signature);
        self.initialized = true;
    }

    /// Registers (or replaces) the field list of `"Domain.event"`.
    ///
    /// The order of `params` is the order in which handlers receive the
    /// event's arguments.
    pub fn register_event<I, S>(&mut self, event_name: &str, params: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (domain, _) = split_method(event_name);
        let signature = EventSignature {
            method: event_name.to_string(),
            params: params.into_iter().map(Into::into).collect(),
        };
        self.dispatchers
            .entry(domain.to_string())
            .or_insert_with(|| DispatcherSchema::new(domain))
            .events
            .insert(event_name.to_string(), signature);
        self.initialized = true;
    }

    /// Attaches the constant table `"Domain.Name"` to its domain namespace.
    pub fn register_enum(&mut self, name: &str, table: EnumTable) {
        let (domain, short) = split_method(name);
        self.enums
            .entry(domain.to_string())
            .or_default()
            .insert(short.to_string(), table);
        self.initialized = true;
    }

    /// Returns `true` once anything has been registered.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The commands of `domain`, if any were registered.
    pub fn agent(&self, domain: &str) -> Option<&AgentSchema> {
        self.agents.get(domain)
    }

    /// The events of `domain`, if any were registered.
    pub fn dispatcher(&self, domain: &str) -> Option<&DispatcherSchema> {
        self.dispatchers.get(domain)
    }

    /// Looks up a command by its fully-qualified name.
    pub fn command(&self, method: &str) -> Option<&CommandSignature> {
        let (domain, name) = split_method(method);
        self.agent(domain)?.command(name)
    }

    /// Looks up an event by its fully-qualified name.
    pub fn event(&self, method: &str) -> Option<&EventSignature> {
        let (domain, _) = split_method(method);
        self.dispatcher(domain)?.event(method)
    }

    /// Looks up an enum table by its fully-qualified name (`"Page.TransitionType"`).
    pub fn enum_table(&self, name: &str) -> Option<&EnumTable> {
        let (domain, short) = split_method(name);
        self.enums.get(domain)?.get(short)
    }

    /// Domains with at least one registered command, in sorted order.
    pub fn agent_domains(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    /// Domains with at least one registered event, in sorted order.
    pub fn dispatcher_domains(&self) -> impl Iterator<Item = &str> {
        self.dispatchers.keys().map(String::as_str)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
