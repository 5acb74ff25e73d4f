//! Event fan-out for one domain.
//!
//! Each target owns one [`EventRouter`] per domain that declares events.
//! Application code registers [`EventHandler`]s on it; when a notification
//! for that domain arrives, the router maps the named parameters onto the
//! declared positional order and calls every handler that responds to the
//! event, in registration order.
//!
//! # For beginners: handler objects
//!
//! A handler is one object covering any subset of a domain's events.  It
//! says which events it wants through [`EventHandler::responds_to`]; events it
//! does not respond to are simply skipped for that handler.  The quickest
//! way to build one is [`EventHandlerTable`]:
//!
//! ```rust
//! use inspector_backend::application::EventHandlerTable;
//!
//! let handler = EventHandlerTable::new()
//!     .on("loadingFinished", |args| println!("request {:?} finished", args.get(0)))
//!     .on("loadingFailed", |args| println!("request {:?} failed", args.get(0)));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use inspector_core::{build_event_args, EventArgs, NotificationEnvelope, ProtocolError, SchemaRegistry};
use serde_json::{Map, Value};

/// An object that receives some or all events of one domain.
#[cfg_attr(test, mockall::automock)]
pub trait EventHandler: Send + Sync {
    /// Returns `true` if this handler wants `event` (short name, e.g.
    /// `"barHappened"`).
    fn responds_to(&self, event: &str) -> bool;

    /// Handles one event.  `args` follows the declared field order.
    fn handle_event(&self, event: &str, args: &EventArgs);
}

type Callback = Box<dyn Fn(&EventArgs) + Send + Sync>;

/// An [`EventHandler`] built from closures, one per event name.
#[derive(Default)]
pub struct EventHandlerTable {
    callbacks: HashMap<String, Callback>,
}

impl EventHandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the closure for `event`.
    pub fn on(
        mut self,
        event: impl Into<String>,
        callback: impl Fn(&EventArgs) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.insert(event.into(), Box::new(callback));
        self
    }
}

impl std::fmt::Debug for EventHandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut events: Vec<&str> = self.callbacks.keys().map(String::as_str).collect();
        events.sort_unstable();
        f.debug_struct("EventHandlerTable").field("events", &events).finish()
    }
}

impl EventHandler for EventHandlerTable {
    fn responds_to(&self, event: &str) -> bool {
        self.callbacks.contains_key(event)
    }

    fn handle_event(&self, event: &str, args: &EventArgs) {
        if let Some(callback) = self.callbacks.get(event) {
            callback(args);
        }
    }
}

/// Per-target, per-domain handler list.
pub struct EventRouter {
    domain: String,
    registry: Arc<SchemaRegistry>,
    handlers: Mutex<Vec<Arc<dyn EventHandler>>>,
}

impl EventRouter {
    /// Creates an empty router for `domain`.
    pub fn new(domain: impl Into<String>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            domain: domain.into(),
            registry,
            handlers: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn EventHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Appends a handler.  Adding the same handler twice makes it run twice
    /// per event.
    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.lock().push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.lock().len()
    }

    /// Routes one notification to the registered handlers.
    ///
    /// Returns the number of handlers invoked.  With no handlers registered
    /// this returns `Ok(0)` without looking at the schema.  Handlers run
    /// outside the router's lock, on a snapshot of the list taken before the
    /// first one is called, so a handler may register further handlers.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnregisteredEvent`] if the event was never
    /// declared.  No handler is invoked in that case.
    pub fn dispatch(
        &self,
        event_name: &str,
        notification: &NotificationEnvelope,
    ) -> Result<usize, ProtocolError> {
        let handlers: Vec<Arc<dyn EventHandler>> = self.lock().clone();
        if handlers.is_empty() {
            return Ok(0);
        }

        let Some(signature) = self
            .registry
            .dispatcher(&self.domain)
            .and_then(|schema| schema.event(&notification.method))
        else {
            return Err(ProtocolError::UnregisteredEvent {
                method: notification.method.clone(),
                message: notification_text(notification),
            });
        };

        let args = build_event_args(signature, notification.params.as_ref());
        let mut invoked = 0;
        for handler in handlers.iter().filter(|h| h.responds_to(event_name)) {
            handler.handle_event(event_name, &args);
            invoked += 1;
        }
        Ok(invoked)
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("domain", &self.domain)
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Re-serialises a notification for log lines.
pub(crate) fn notification_text(notification: &NotificationEnvelope) -> String {
    let mut object = Map::new();
    object.insert("method".to_string(), Value::String(notification.method.clone()));
    if let Some(params) = &notification.params {
        object.insert("params".to_string(), Value::Object(params.clone()));
    }
    Value::Object(object).to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
