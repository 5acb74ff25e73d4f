//! The target: one live protocol session.
//!
//! A [`Target`] owns a [`Connection`], hands out message ids, remembers every
//! outstanding command and routes everything that comes back: responses to
//! the caller that sent the command, notifications to the domain's
//! [`EventRouter`].
//!
//! # Lifecycle
//!
//! ```text
//!  Created ──factory ok──► Active ──on_disconnect / disconnect()──► Disposed
//!     │                                                               ▲
//!     └────────────────────────factory failed─────────────────────────┘
//! ```
//!
//! Disposal is one-way.  On the transition every outstanding call completes
//! with the connection-closed error, the dispose hooks run, and from then on
//! commands fail without being sent.
//!
//! # For beginners: the message pump
//!
//! [`Target::connect`] spawns one tokio task that reads the connection's
//! event channel and calls [`Target::on_message`] / [`Target::on_disconnect`]
//! in arrival order.  The pump holds only a `Weak` reference, so dropping the
//! last `Arc<Target>` ends the session: the pending table is dropped with the
//! target and every unanswered reply future resolves as connection-closed.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use inspector_core::{
    split_method, CommandEnvelope, InboundEnvelope, InboundMessage, MessageIdCounter,
    NotificationEnvelope, ProtocolError, ResponseEnvelope, SchemaRegistry,
};
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

use crate::application::agent::{self, Agent};
use crate::application::dispatcher::{notification_text, EventHandler, EventRouter};
use crate::application::observer::{MessageObserver, SentMessage};
use crate::application::pending::{PendingCall, PendingCalls, ReplyFuture};
use crate::domain::BackendOptions;
use crate::infrastructure::{Connection, ConnectionError, ConnectionEvent, ConnectionParams};

/// Reason logged when [`Target::disconnect`] closes the session.
pub const REASON_DISCONNECT_REQUESTED: &str = "force disconnect";

/// Reason logged when the connection vanished without reporting why.
pub const REASON_CONNECTION_DROPPED: &str = "connection dropped";

type Continuation = Box<dyn FnOnce() + Send>;

/// Where a target is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// The connection factory has not finished yet.
    Created,
    /// Connected; commands are sent.
    Active,
    /// Disconnected for good; commands fail with connection-closed.
    Disposed,
}

struct Link {
    state: TargetState,
    connection: Option<Arc<dyn Connection>>,
}

impl Link {
    fn live_connection(&self) -> Option<&Arc<dyn Connection>> {
        match self.state {
            TargetState::Active => self.connection.as_ref(),
            TargetState::Created | TargetState::Disposed => None,
        }
    }
}

/// One protocol session over one connection.
pub struct Target {
    registry: Arc<SchemaRegistry>,
    options: BackendOptions,
    ids: MessageIdCounter,
    link: Mutex<Link>,
    pending: PendingCalls,
    routers: HashMap<String, EventRouter>,
    observers: Mutex<Vec<Arc<dyn MessageObserver>>>,
    is_node_js: AtomicBool,
    dispose_hooks: Mutex<Vec<Continuation>>,
    after_pending: Mutex<VecDeque<Continuation>>,
    drain_guard: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Target {
    fn new(registry: Arc<SchemaRegistry>, options: BackendOptions, is_node_js: bool) -> Self {
        let routers = registry
            .dispatcher_domains()
            .map(|domain| (domain.to_string(), EventRouter::new(domain, Arc::clone(&registry))))
            .collect();
        Self {
            registry,
            options,
            ids: MessageIdCounter::new(),
            link: Mutex::new(Link {
                state: TargetState::Created,
                connection: None,
            }),
            pending: PendingCalls::new(),
            routers,
            observers: Mutex::new(Vec::new()),
            is_node_js: AtomicBool::new(is_node_js),
            dispose_hooks: Mutex::new(Vec::new()),
            after_pending: Mutex::new(VecDeque::new()),
            drain_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a target and connects it through `factory`.
    ///
    /// One [`Agent`] view exists for every domain with commands and one
    /// [`EventRouter`] for every domain with events in `registry`.  The
    /// factory receives the [`ConnectionParams`] the connection must report
    /// inbound traffic through.
    ///
    /// Must be called inside a tokio runtime; the message pump is spawned on
    /// it.
    ///
    /// # Errors
    ///
    /// Returns the factory's error.  The half-built target is disposed and
    /// dropped.
    pub async fn connect<F, Fut>(
        registry: Arc<SchemaRegistry>,
        options: BackendOptions,
        is_node_js: bool,
        factory: F,
    ) -> Result<Arc<Self>, ConnectionError>
    where
        F: FnOnce(ConnectionParams) -> Fut,
        Fut: Future<Output = Result<Box<dyn Connection>, ConnectionError>>,
    {
        let target = Arc::new(Self::new(registry, options, is_node_js));
        let (params, events) = ConnectionParams::channel();

        match factory(params).await {
            Ok(connection) => {
                let mut link = lock(&target.link);
                link.connection = Some(Arc::from(connection));
                link.state = TargetState::Active;
            }
            Err(e) => {
                lock(&target.link).state = TargetState::Disposed;
                error!("failed to connect target: {e}");
                return Err(e);
            }
        }

        info!(
            agents = target.registry.agent_domains().count(),
            dispatchers = target.routers.len(),
            "target connected"
        );
        tokio::spawn(run_message_pump(Arc::downgrade(&target), events));
        Ok(target)
    }

    pub fn state(&self) -> TargetState {
        lock(&self.link).state
    }

    /// Returns `true` once the target has been disconnected.
    pub fn is_disposed(&self) -> bool {
        self.state() == TargetState::Disposed
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    /// The command view for `domain`, if the domain declares commands.
    pub fn agent(&self, domain: &str) -> Option<Agent<'_>> {
        self.registry.agent(domain).map(|schema| Agent::new(self, schema))
    }

    /// The event router for `domain`, if the domain declares events.
    pub fn router(&self, domain: &str) -> Option<&EventRouter> {
        self.routers.get(domain)
    }

    /// Registers an event handler for `domain`.
    ///
    /// Returns `false` (and registers nothing) if the domain has no events.
    pub fn register_dispatcher(&self, domain: &str, handler: Arc<dyn EventHandler>) -> bool {
        match self.routers.get(domain) {
            Some(router) => {
                router.add_handler(handler);
                true
            }
            None => {
                debug!(domain, "no events declared, handler not registered");
                false
            }
        }
    }

    /// Adds an observer that sees every message sent and received.
    pub fn add_message_observer(&self, observer: Arc<dyn MessageObserver>) {
        lock(&self.observers).push(observer);
    }

    /// Sends one command and returns the future for its reply.
    ///
    /// On an active target the id is allocated, the call is recorded as
    /// pending and the envelope is handed to the connection before this
    /// returns.  On a target that is not active nothing is sent and the
    /// future resolves to the connection-closed error.
    pub fn invoke(
        &self,
        domain: &str,
        method: &str,
        params: Option<Map<String, Value>>,
    ) -> ReplyFuture {
        let (call, reply) = PendingCall::new(domain, method);

        let sent = {
            let link = lock(&self.link);
            match link.live_connection() {
                Some(connection) => {
                    let id = self.ids.next();
                    let envelope = CommandEnvelope::new(id, method, params);
                    let text = envelope.to_json();
                    if self.options.dump_protocol_messages {
                        let sink = format!("[FE] {domain}");
                        info!(sink = %sink, "frontend: {text}");
                    }
                    self.pending.insert(id, call);
                    connection.send_raw_message(text);
                    Ok(envelope)
                }
                None => Err(call),
            }
        };

        match sent {
            Ok(envelope) => self.notify_sent(domain, envelope),
            Err(call) => {
                debug!(method, "target is not connected, command not sent");
                call.fail_connection_closed();
            }
        }
        reply
    }

    /// Sends `method` with a raw parameter object, bypassing validation.
    ///
    /// The domain is taken from the method name.
    pub fn send_raw_message_for_testing(
        &self,
        method: &str,
        params: Option<Map<String, Value>>,
    ) -> ReplyFuture {
        let (domain, _) = split_method(method);
        self.invoke(domain, method, params)
    }

    fn notify_sent(&self, domain: &str, envelope: CommandEnvelope) {
        let observers = lock(&self.observers).clone();
        if observers.is_empty() {
            return;
        }
        let message = SentMessage {
            domain: domain.to_string(),
            method: envelope.method,
            params: envelope.params,
            id: envelope.id,
        };
        for observer in &observers {
            observer.message_sent(&message);
        }
    }

    fn notify_received(&self, message: &Value) {
        let observers = lock(&self.observers).clone();
        for observer in &observers {
            observer.message_received(message);
        }
    }

    /// Handles one inbound message, logging any protocol error.
    pub fn on_message(&self, message: impl Into<InboundMessage>) {
        if let Err(e) = self.handle_message(message.into()) {
            if e.is_benign() {
                debug!("{e}");
            } else {
                error!("{e}");
            }
        }
    }

    /// Handles one inbound message.
    ///
    /// # Errors
    ///
    /// Returns the [`ProtocolError`] describing why the message could not be
    /// routed.  The target stays usable whatever the error.
    ///
    /// A disposed target routes nothing: responses are reported as
    /// [`ProtocolError::ResponseAfterDisposal`] and notifications are dropped.
    pub fn handle_message(&self, message: InboundMessage) -> Result<(), ProtocolError> {
        if self.is_disposed() {
            return discard_after_disposal(message);
        }

        if self.options.dump_protocol_messages {
            match &message {
                InboundMessage::Text(text) => info!(sink = "Backend", "backend: {text}"),
                InboundMessage::Value(value) => info!(sink = "Backend", "backend: {value}"),
            }
        }

        let value = message.into_value()?;
        self.notify_received(&value);

        match InboundEnvelope::from_value(value)? {
            InboundEnvelope::Response(response) => self.handle_response(response),
            InboundEnvelope::Notification(notification) => self.handle_notification(notification),
        }
    }

    fn handle_response(&self, response: ResponseEnvelope) -> Result<(), ProtocolError> {
        let Some(call) = self.pending.take(response.id) else {
            return Err(self.orphan_response_error(&response));
        };

        let timing = self
            .options
            .dump_time_stats
            .then(|| (call.method.clone(), call.elapsed(), Instant::now()));
        agent::dispatch_response(&self.options, call, response);
        self.pending.publish_count();

        if let Some((method, round_trip, started)) = timing {
            let elapsed_ms = millis(started.elapsed());
            let round_trip_ms = millis(round_trip);
            info!(elapsed_ms, round_trip_ms, "time-stats: {method}");
        }
        Ok(())
    }

    fn orphan_response_error(&self, response: &ResponseEnvelope) -> ProtocolError {
        let id = response.id;
        if !self.ids.was_issued(id) {
            ProtocolError::UnknownResponseId {
                id,
                message: agent::response_text(response),
            }
        } else if self.is_disposed() {
            ProtocolError::ResponseAfterDisposal { id }
        } else {
            ProtocolError::DuplicateResponse {
                id,
                message: agent::response_text(response),
            }
        }
    }

    fn handle_notification(&self, notification: NotificationEnvelope) -> Result<(), ProtocolError> {
        let domain = notification.domain();
        let Some(router) = self.routers.get(domain) else {
            return Err(ProtocolError::UnknownDomain {
                method: notification.method.clone(),
                domain: domain.to_string(),
                message: notification_text(&notification),
            });
        };

        let started = self.options.dump_time_stats.then(Instant::now);
        let result = router.dispatch(notification.event_name(), &notification);
        if let Some(started) = started {
            let elapsed_ms = millis(started.elapsed());
            let method = &notification.method;
            info!(elapsed_ms, "time-stats: {method}");
        }
        result.map(|_| ())
    }

    /// Disposes the target.  Only the first call has any effect.
    ///
    /// The connection is released, every outstanding call completes with the
    /// connection-closed error (in id order) and the dispose hooks run.
    pub fn on_disconnect(&self, reason: &str) {
        let connection = {
            let mut link = lock(&self.link);
            if link.state == TargetState::Disposed {
                return;
            }
            link.state = TargetState::Disposed;
            link.connection.take()
        };
        drop(connection);

        let outstanding = self.pending.drain();
        info!(reason, pending = outstanding.len(), "target disconnected");
        for (_, call) in outstanding {
            call.fail_connection_closed();
        }
        self.pending.publish_count();

        let hooks = std::mem::take(&mut *lock(&self.dispose_hooks));
        for hook in hooks {
            hook();
        }
    }

    /// Closes the connection and disposes the target.
    pub async fn disconnect(&self) {
        let connection = lock(&self.link).connection.clone();
        if let Some(connection) = connection {
            connection.disconnect().await;
        }
        self.on_disconnect(REASON_DISCONNECT_REQUESTED);
    }

    /// Registers a hook to run once when the target is disposed.
    ///
    /// On an already disposed target the hook runs immediately.
    pub fn on_dispose(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut hooks = lock(&self.dispose_hooks);
            if !self.is_disposed() {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    pub fn is_node_js(&self) -> bool {
        self.is_node_js.load(Ordering::Relaxed)
    }

    pub fn mark_as_node_js_for_test(&self) {
        self.is_node_js.store(true, Ordering::Relaxed);
    }

    /// Number of commands sent and not yet answered.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Waits until no command is outstanding.
    pub async fn wait_for_quiescence(&self) {
        let mut count = self.pending.subscribe();
        // The sender lives in `self`, so it cannot close while we wait.
        let _ = count.wait_for(|n| *n == 0).await;
    }

    /// Runs `continuation` once no command is outstanding.
    ///
    /// Continuations run in registration order.  Each one runs only while the
    /// pending count is zero; if a continuation sends a command, the rest wait
    /// for its reply.  A queued continuation does not keep the target alive:
    /// if the target is dropped first, the continuation never runs.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn run_after_pending_dispatches(self: &Arc<Self>, continuation: impl FnOnce() + Send + 'static) {
        lock(&self.after_pending).push_back(Box::new(continuation));

        let target = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let mut count = match target.upgrade() {
                    Some(target) => target.pending.subscribe(),
                    None => return,
                };
                // Fails only once the target, and with it the sender, is gone.
                if count.wait_for(|n| *n == 0).await.is_err() {
                    return;
                }
                drop(count);

                let Some(target) = target.upgrade() else {
                    return;
                };
                let _guard = target.drain_guard.lock().await;
                if target.run_queued_continuations() {
                    return;
                }
            }
        });
    }

    /// Runs queued continuations while nothing is pending.  Returns `true`
    /// once the queue is empty.
    fn run_queued_continuations(&self) -> bool {
        loop {
            if self.pending.count() != 0 {
                return false;
            }
            let next = lock(&self.after_pending).pop_front();
            match next {
                Some(continuation) => continuation(),
                None => return true,
            }
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("state", &self.state())
            .field("pending", &self.pending.len())
            .field("next_id", &self.ids.peek())
            .field("routers", &self.routers.len())
            .finish()
    }
}

/// Classifies a message that reached a disposed target without routing it.
fn discard_after_disposal(message: InboundMessage) -> Result<(), ProtocolError> {
    match InboundEnvelope::from_value(message.into_value()?)? {
        InboundEnvelope::Response(response) => Err(ProtocolError::ResponseAfterDisposal { id: response.id }),
        InboundEnvelope::Notification(notification) => {
            let method = &notification.method;
            debug!("target disposed, notification {method} dropped");
            Ok(())
        }
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Feeds connection events into the target until it is disposed or dropped.
async fn run_message_pump(target: Weak<Target>, mut events: UnboundedReceiver<ConnectionEvent>) {
    while let Some(event) = events.recv().await {
        let Some(target) = target.upgrade() else {
            return;
        };
        if target.is_disposed() {
            debug!("target disposed, message pump stopped");
            return;
        }
        match event {
            ConnectionEvent::Message(message) => target.on_message(message),
            ConnectionEvent::Disconnect(reason) => {
                target.on_disconnect(&reason);
                return;
            }
        }
    }

    if let Some(target) = target.upgrade() {
        target.on_disconnect(REASON_CONNECTION_DROPPED);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CallError;
    use crate::infrastructure::in_process_pair;
    use inspector_core::{ParamDescriptor, ParamType};
    use serde_json::json;
    use tokio_test::{assert_ready, task};

    fn registry() -> Arc<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        registry.register_command("Foo.bar", vec![ParamDescriptor::required("x", ParamType::Number)], ["y"], false);
        registry.register_event("Foo.barHappened", ["a"]);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_ids_increase_from_one() {
        // Arrange
        let (factory, mut remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");

        // Act
        let _first = target.invoke("Foo", "Foo.bar", None);
        let _second = target.invoke("Foo", "Foo.bar", None);

        // Assert
        assert_eq!(remote.next_sent_json().await.unwrap()["id"], json!(1));
        assert_eq!(remote.next_sent_json().await.unwrap()["id"], json!(2));
        assert_eq!(target.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_factory_returns_error() {
        let result = Target::connect(registry(), BackendOptions::default(), false, |_params| async {
            Err::<Box<dyn Connection>, _>(ConnectionError::Refused("no backend".to_string()))
        })
        .await;

        assert!(matches!(result, Err(ConnectionError::Refused(_))));
    }

    #[tokio::test]
    async fn test_invoke_after_disposal_fails_without_sending() {
        // Arrange
        let (factory, mut remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");
        target.on_disconnect("websocket closed");

        // Act
        let mut reply = task::spawn(target.invoke("Foo", "Foo.bar", None));

        // Assert
        assert_eq!(assert_ready!(reply.poll()), Err(CallError::connection_closed("Foo.bar")));
        assert!(remote.try_next_sent().is_none());
        assert_eq!(target.state(), TargetState::Disposed);
    }

    #[tokio::test]
    async fn test_response_for_never_issued_id_is_classified_unknown() {
        let (factory, _remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");

        let result = target.handle_message(InboundMessage::from(json!({"id": 99, "result": {}})));

        assert!(matches!(result, Err(ProtocolError::UnknownResponseId { id: 99, .. })));
    }

    #[tokio::test]
    async fn test_second_response_for_same_id_is_a_duplicate() {
        // Arrange
        let (factory, _remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");
        let reply = target.invoke("Foo", "Foo.bar", None);
        target
            .handle_message(InboundMessage::from(json!({"id": 1, "result": {"y": 1}})))
            .expect("first response");

        // Act
        let result = target.handle_message(InboundMessage::from(json!({"id": 1, "result": {"y": 2}})));

        // Assert
        assert!(matches!(result, Err(ProtocolError::DuplicateResponse { id: 1, .. })));
        assert_eq!(reply.await, Ok(json!({"y": 1})));
    }

    #[tokio::test]
    async fn test_response_after_disposal_is_benign() {
        let (factory, _remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");
        let reply = target.invoke("Foo", "Foo.bar", None);
        target.on_disconnect("websocket closed");

        let result = target.handle_message(InboundMessage::from(json!({"id": 1, "result": {}})));

        assert_eq!(result, Err(ProtocolError::ResponseAfterDisposal { id: 1 }));
        assert!(result.unwrap_err().is_benign());
        assert!(reply.await.unwrap_err().is_connection_closed());
    }

    #[tokio::test]
    async fn test_notification_after_disposal_is_dropped() {
        // Arrange
        let (factory, _remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");
        let hits = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&hits);
        target.register_dispatcher(
            "Foo",
            Arc::new(crate::application::EventHandlerTable::new().on("barHappened", move |_| *lock(&sink) += 1)),
        );
        target.on_disconnect("websocket closed");

        // Act
        let result = target.handle_message(InboundMessage::from(json!({"method": "Foo.barHappened", "params": {"a": 1}})));

        // Assert
        assert_eq!(result, Ok(()));
        assert_eq!(*lock(&hits), 0);
    }

    #[tokio::test]
    async fn test_notification_for_unknown_domain_is_rejected() {
        let (factory, _remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");

        let result = target.handle_message(InboundMessage::from(json!({"method": "Nope.happened"})));

        assert!(matches!(
            result,
            Err(ProtocolError::UnknownDomain { ref domain, .. }) if domain == "Nope"
        ));
    }

    #[tokio::test]
    async fn test_on_dispose_after_disposal_runs_immediately() {
        let (factory, _remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");
        target.on_disconnect("websocket closed");
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        target.on_dispose(move || flag.store(true, Ordering::SeqCst));

        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_register_dispatcher_for_domain_without_events_is_ignored() {
        let (factory, _remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");

        let registered = target.register_dispatcher(
            "Network",
            Arc::new(crate::application::EventHandlerTable::new()),
        );

        assert!(!registered);
        assert!(target.router("Foo").is_some());
        assert!(target.router("Network").is_none());
    }

    #[tokio::test]
    async fn test_node_js_flag() {
        let (factory, _remote) = in_process_pair();
        let target = Target::connect(registry(), BackendOptions::default(), false, factory)
            .await
            .expect("connect");
        assert!(!target.is_node_js());

        target.mark_as_node_js_for_test();

        assert!(target.is_node_js());
    }
}
