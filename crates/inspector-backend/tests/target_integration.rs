//! End-to-end tests for a target over the in-process connection.
//!
//! # Purpose
//!
//! These tests drive a [`Target`] through its public API the way application
//! code does, while the test plays the remote end through a [`RemoteEnd`].
//! They verify:
//!
//! - What goes on the wire: one envelope per call, increasing ids, `params`
//!   omitted when empty, nothing sent when validation fails.
//! - How replies come back: correlation by id in any order, the primary reply
//!   field on the positional path, the full result or a failure on the raw
//!   path, connection-closed for everything in flight on disconnect.
//! - How events fan out: registration order, declared positional arity,
//!   unregistered events reaching nobody.
//!
//! # Timing
//!
//! Inbound messages are handled by the target's message pump task, so after
//! [`RemoteEnd::deliver`] the tests always *await* something (a reply future
//! or an event channel) rather than asserting immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use inspector_backend::application::{
    EventHandlerTable, MessageObserver, SentMessage, Target, TargetState,
};
use inspector_backend::domain::{BackendOptions, CallError, ProtocolResponse};
use inspector_backend::infrastructure::{in_process_pair, RemoteEnd, StubConnection};
use inspector_core::{
    CallArgs, EventArgs, ParamDescriptor, ParamType, SchemaRegistry, CONNECTION_CLOSED_ERROR_CODE,
    STUB_ERROR_CODE,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_test::{assert_pending, assert_ready, task};

const WAIT: Duration = Duration::from_secs(2);

/// A registry with the domains used throughout these tests.
fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register_command("Foo.bar", vec![ParamDescriptor::required("x", ParamType::Number)], ["y"], false);
    registry.register_command(
        "Foo.baz",
        vec![
            ParamDescriptor::required("name", ParamType::String),
            ParamDescriptor::optional("deep", ParamType::Boolean),
        ],
        ["first", "second"],
        false,
    );
    registry.register_command("Foo.explode", vec![], Vec::<String>::new(), true);
    registry.register_command("Network.enable", vec![], Vec::<String>::new(), false);
    registry.register_event("Foo.barHappened", ["a", "b"]);
    registry.register_event("Foo.bazHappened", ["c"]);
    registry
}

async fn connect() -> (Arc<Target>, RemoteEnd) {
    let (factory, remote) = in_process_pair();
    let target = Target::connect(Arc::new(registry()), BackendOptions::default(), false, factory)
        .await
        .expect("in-process connect never fails");
    (target, remote)
}

async fn next_sent(remote: &mut RemoteEnd) -> Value {
    timeout(WAIT, remote.next_sent_json())
        .await
        .expect("target sent nothing")
        .expect("sent text is JSON")
}

/// Event handler that forwards `(event, args)` for `events` to a channel.
fn forwarding_handler(
    tag: &'static str,
    events: &[&'static str],
    tx: mpsc::UnboundedSender<(&'static str, String, EventArgs)>,
) -> Arc<EventHandlerTable> {
    let mut table = EventHandlerTable::new();
    for &event in events {
        let tx = tx.clone();
        table = table.on(event, move |args| {
            let _ = tx.send((tag, event.to_string(), args.clone()));
        });
    }
    Arc::new(table)
}

// ── Outbound envelopes ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_positional_call_sends_declared_parameter_object() {
    // Arrange
    let (target, mut remote) = connect().await;
    let agent = target.agent("Foo").expect("Foo has commands");

    // Act
    let reply = agent.call("bar", CallArgs::new().with(5));

    // Assert: exactly one envelope with the declared params
    assert_eq!(
        next_sent(&mut remote).await,
        json!({"id": 1, "method": "Foo.bar", "params": {"x": 5}})
    );
    assert!(remote.try_next_sent().is_none());

    remote.deliver(json!({"id": 1, "result": {"y": "done"}}));
    assert_eq!(timeout(WAIT, reply).await.unwrap(), Ok(Some(json!("done"))));
}

#[tokio::test]
async fn test_command_without_params_omits_params_member() {
    // Arrange
    let (target, mut remote) = connect().await;
    let agent = target.agent("Network").expect("Network has commands");

    // Act
    let reply = agent.invoke("enable", None);
    let sent = timeout(WAIT, remote.next_sent()).await.unwrap().unwrap();

    // Assert: the literal wire text has no params member
    assert_eq!(sent, r#"{"id":1,"method":"Network.enable"}"#);

    remote.deliver(r#"{"id":1,"result":{}}"#);
    assert_eq!(timeout(WAIT, reply).await.unwrap(), ProtocolResponse::Success(json!({})));
}

#[tokio::test]
async fn test_optional_undefined_argument_is_omitted() {
    let (target, mut remote) = connect().await;
    let agent = target.agent("Foo").unwrap();

    let _reply = agent.call("baz", CallArgs::new().with("node").undefined());

    assert_eq!(
        next_sent(&mut remote).await,
        json!({"id": 1, "method": "Foo.baz", "params": {"name": "node"}})
    );
}

#[tokio::test]
async fn test_invalid_arguments_are_rejected_before_sending() {
    // Arrange
    let (target, mut remote) = connect().await;
    let agent = target.agent("Foo").unwrap();

    // Act: wrong type, missing argument, extra argument
    let wrong_type = agent.call("bar", CallArgs::new().with("five")).await;
    let missing = agent.call("bar", CallArgs::new()).await;
    let extra = agent.call("bar", CallArgs::new().with(1).with(2)).await;

    // Assert
    assert!(matches!(wrong_type, Err(CallError::InvalidParameters(_))));
    assert!(matches!(missing, Err(CallError::InvalidParameters(_))));
    assert!(matches!(extra, Err(CallError::InvalidParameters(_))));
    assert!(remote.try_next_sent().is_none());
    assert_eq!(target.pending_count(), 0);
}

#[tokio::test]
async fn test_unknown_command_is_rejected_before_sending() {
    let (target, mut remote) = connect().await;

    let result = target.agent("Foo").unwrap().call("nope", CallArgs::new()).await;

    assert_eq!(
        result,
        Err(CallError::UnknownCommand {
            method: "Foo.nope".to_string()
        })
    );
    assert!(remote.try_next_sent().is_none());
}

#[tokio::test]
async fn test_ids_keep_increasing_regardless_of_reply_order() {
    // Arrange
    let (target, mut remote) = connect().await;
    let first = target.invoke("Foo", "Foo.bar", None);
    let second = target.invoke("Foo", "Foo.bar", None);
    assert_eq!(next_sent(&mut remote).await["id"], json!(1));
    assert_eq!(next_sent(&mut remote).await["id"], json!(2));

    // Act: answer the second call first, then send another
    remote.deliver(json!({"id": 2, "result": {}}));
    timeout(WAIT, second).await.unwrap().unwrap();
    let _third = target.invoke("Foo", "Foo.bar", None);

    // Assert
    assert_eq!(next_sent(&mut remote).await["id"], json!(3));
    drop(first);
}

// ── Response correlation ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_out_of_order_replies_complete_matching_calls() {
    // Arrange
    let (target, mut remote) = connect().await;
    let agent = target.agent("Foo").unwrap();
    let mut first = task::spawn(agent.call("bar", CallArgs::new().with(1)));
    let second = agent.call("bar", CallArgs::new().with(2));
    next_sent(&mut remote).await;
    next_sent(&mut remote).await;

    // Act: reply to id 2 only
    remote.deliver(json!({"id": 2, "result": {"y": "two"}}));
    let second = timeout(WAIT, second).await.unwrap();

    // Assert: call 2 is done while call 1 still waits
    assert_eq!(second, Ok(Some(json!("two"))));
    assert_pending!(first.poll());

    remote.deliver(json!({"id": 1, "result": {"y": "one"}}));
    assert_eq!(timeout(WAIT, first).await.unwrap(), Ok(Some(json!("one"))));
    assert_eq!(target.pending_count(), 0);
}

#[tokio::test]
async fn test_primary_reply_field_is_the_first_declared_one() {
    let (target, mut remote) = connect().await;
    let reply = target.agent("Foo").unwrap().call("baz", CallArgs::new().with("n"));
    next_sent(&mut remote).await;

    remote.deliver(json!({"id": 1, "result": {"second": 2, "first": 1}}));

    assert_eq!(timeout(WAIT, reply).await.unwrap(), Ok(Some(json!(1))));
}

#[tokio::test]
async fn test_command_without_reply_fields_resolves_to_none() {
    let (target, mut remote) = connect().await;
    let reply = target.agent("Network").unwrap().call("enable", CallArgs::new());
    next_sent(&mut remote).await;

    remote.deliver(json!({"id": 1, "result": {"ignored": true}}));

    assert_eq!(timeout(WAIT, reply).await.unwrap(), Ok(None));
}

#[tokio::test]
async fn test_remote_error_fails_positional_call() {
    // Arrange
    let (target, mut remote) = connect().await;
    let reply = target.agent("Foo").unwrap().call("bar", CallArgs::new().with(1));
    next_sent(&mut remote).await;

    // Act
    remote.deliver(json!({"id": 1, "error": {"code": -32601, "message": "'Foo.bar' wasn't found"}}));

    // Assert
    let error = timeout(WAIT, reply).await.unwrap().unwrap_err();
    assert_eq!(error.code(), Some(-32601));
    assert!(!error.is_connection_closed());
}

#[tokio::test]
async fn test_raw_invoke_keeps_error_data_only_when_declared() {
    // Arrange
    let (target, mut remote) = connect().await;
    let agent = target.agent("Foo").unwrap();
    let with_data = agent.invoke("explode", None);
    let without_data = agent.invoke("bar", Some(json!({"x": 1}).as_object().unwrap().clone()));
    next_sent(&mut remote).await;
    next_sent(&mut remote).await;

    // Act
    let error = json!({"code": -32000, "message": "kaboom", "data": {"why": "because"}});
    remote.deliver(json!({"id": 1, "error": error}));
    remote.deliver(json!({"id": 2, "error": error}));

    // Assert
    assert_eq!(
        timeout(WAIT, with_data).await.unwrap(),
        ProtocolResponse::Failure {
            message: "kaboom".to_string(),
            data: Some(json!({"why": "because"})),
        }
    );
    assert_eq!(
        timeout(WAIT, without_data).await.unwrap(),
        ProtocolResponse::Failure {
            message: "kaboom".to_string(),
            data: None,
        }
    );
}

#[tokio::test]
async fn test_unknown_reply_id_is_ignored_and_target_stays_usable() {
    // Arrange
    let (target, mut remote) = connect().await;
    let reply = target.invoke("Foo", "Foo.bar", None);
    next_sent(&mut remote).await;

    // Act: garbage and an id that was never issued, then the real reply
    remote.deliver("not json at all");
    remote.deliver(json!({"id": 41, "result": {}}));
    remote.deliver(json!({"params": {}}));
    remote.deliver(json!({"id": 1, "result": {"ok": true}}));

    // Assert
    assert_eq!(timeout(WAIT, reply).await.unwrap(), Ok(json!({"ok": true})));
    assert_eq!(target.state(), TargetState::Active);
}

// ── Disconnect ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_fails_every_outstanding_call_once() {
    // Arrange: three calls in flight
    let (target, mut remote) = connect().await;
    let replies: Vec<_> = (0..3).map(|_| target.invoke("Foo", "Foo.bar", None)).collect();
    for _ in 0..3 {
        next_sent(&mut remote).await;
    }
    assert_eq!(target.pending_count(), 3);

    // Act
    remote.close("websocket closed");

    // Assert
    for reply in replies {
        let error = timeout(WAIT, reply).await.unwrap().unwrap_err();
        assert!(error.is_connection_closed());
        assert_eq!(error.code(), Some(CONNECTION_CLOSED_ERROR_CODE));
    }
    assert_eq!(target.pending_count(), 0);
    assert!(target.is_disposed());
}

#[tokio::test]
async fn test_invoke_without_connection_completes_on_await() {
    // Arrange
    let (target, remote) = connect().await;
    remote.close("websocket closed");
    while !target.is_disposed() {
        tokio::task::yield_now().await;
    }

    // Act
    let mut reply = task::spawn(target.agent("Foo").unwrap().call("bar", CallArgs::new().with(1)));

    // Assert: the failure is carried by the returned future, ready on its first poll
    let error = assert_ready!(reply.poll()).unwrap_err();
    assert_eq!(error.to_string(), "Connection is closed, can't dispatch pending Foo.bar");
}

#[tokio::test]
async fn test_explicit_disconnect_runs_dispose_hook() {
    // Arrange
    let (target, mut remote) = connect().await;
    let (hook_tx, hook_rx) = oneshot::channel();
    target.on_dispose(move || {
        let _ = hook_tx.send(());
    });
    let reply = target.invoke("Foo", "Foo.bar", None);
    next_sent(&mut remote).await;

    // Act
    target.disconnect().await;

    // Assert
    timeout(WAIT, hook_rx).await.unwrap().unwrap();
    assert!(timeout(WAIT, reply).await.unwrap().unwrap_err().is_connection_closed());
    assert!(timeout(WAIT, remote.next_sent()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stub_connection_answers_with_stub_error() {
    let target = Target::connect(Arc::new(registry()), BackendOptions::default(), false, StubConnection::factory)
        .await
        .unwrap();

    let error = timeout(WAIT, target.invoke("Foo", "Foo.bar", None))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(error.code(), Some(STUB_ERROR_CODE));
}

// ── Events ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_handlers_receive_events_in_registration_order() {
    // Arrange
    let (target, remote) = connect().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    assert!(target.register_dispatcher("Foo", forwarding_handler("first", &["barHappened"], tx.clone())));
    assert!(target.register_dispatcher("Foo", forwarding_handler("second", &["barHappened"], tx)));

    // Act
    remote.deliver(json!({"method": "Foo.barHappened", "params": {"a": 1, "b": 2}}));

    // Assert
    for expected in ["first", "second"] {
        let (tag, event, args) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(tag, expected);
        assert_eq!(event, "barHappened");
        assert_eq!(args.get(0), Some(&json!(1)));
        assert_eq!(args.get(1), Some(&json!(2)));
    }
}

#[tokio::test]
async fn test_unregistered_event_reaches_no_handler() {
    // Arrange
    let (target, remote) = connect().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    target.register_dispatcher("Foo", forwarding_handler("h", &["quxHappened", "bazHappened"], tx));

    // Act: an undeclared event, then a declared one as a marker
    remote.deliver(json!({"method": "Foo.quxHappened", "params": {}}));
    remote.deliver(json!({"method": "Foo.bazHappened", "params": {"c": 3}}));

    // Assert: the first thing any handler saw is the marker
    let (_, event, args) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(event, "bazHappened");
    assert_eq!(args.get(0), Some(&json!(3)));
}

#[tokio::test]
async fn test_missing_event_fields_keep_declared_arity() {
    let (target, remote) = connect().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    target.register_dispatcher("Foo", forwarding_handler("h", &["barHappened"], tx));

    remote.deliver(json!({"method": "Foo.barHappened"}));

    let (_, _, args) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(args.len(), 2);
    assert_eq!(args.get(0), None);
    assert_eq!(args.get(1), None);
}

#[tokio::test]
async fn test_disposed_target_routes_no_events() {
    // Arrange: an event still queued for the pump when the target disconnects
    let (target, remote) = connect().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    target.register_dispatcher("Foo", forwarding_handler("h", &["barHappened"], tx));
    let event = json!({"method": "Foo.barHappened", "params": {"a": 1, "b": 2}});
    remote.deliver(event.clone());
    target.disconnect().await;

    // Act: let the pump run, then hand the target the same event directly
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    target.on_message(event);

    // Assert
    assert!(target.is_disposed());
    assert!(rx.try_recv().is_err());
}

// ── Observers and quiescence ──────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<SentMessage>>,
    received: Mutex<Vec<Value>>,
}

impl MessageObserver for Recorder {
    fn message_sent(&self, message: &SentMessage) {
        self.sent.lock().unwrap().push(message.clone());
    }

    fn message_received(&self, message: &Value) {
        self.received.lock().unwrap().push(message.clone());
    }
}

#[tokio::test]
async fn test_observer_sees_both_directions() {
    // Arrange
    let (target, mut remote) = connect().await;
    let recorder = Arc::new(Recorder::default());
    target.add_message_observer(recorder.clone());

    // Act
    let reply = target.send_raw_message_for_testing("Foo.bar", Some(json!({"x": 9}).as_object().unwrap().clone()));
    next_sent(&mut remote).await;
    remote.deliver(json!({"id": 1, "result": {}}));
    timeout(WAIT, reply).await.unwrap().unwrap();

    // Assert
    let sent = recorder.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].domain, "Foo");
    assert_eq!(sent[0].method, "Foo.bar");
    assert_eq!(sent[0].id, 1);
    assert_eq!(*recorder.received.lock().unwrap(), vec![json!({"id": 1, "result": {}})]);
}

#[tokio::test]
async fn test_continuations_run_in_order_once_quiescent() {
    // Arrange: one call in flight and two continuations queued behind it
    let (target, mut remote) = connect().await;
    let reply = target.invoke("Foo", "Foo.bar", None);
    next_sent(&mut remote).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    for n in [1, 2] {
        let tx = tx.clone();
        target.run_after_pending_dispatches(move || {
            let _ = tx.send(n);
        });
    }
    tokio::task::yield_now().await;
    assert!(rx.try_recv().is_err());

    // Act
    remote.deliver(json!({"id": 1, "result": {}}));
    timeout(WAIT, reply).await.unwrap().unwrap();

    // Assert
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(1));
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_queued_continuation_does_not_keep_target_alive() {
    // Arrange: an unanswered call with a continuation waiting behind it
    let (target, mut remote) = connect().await;
    let reply = target.invoke("Foo", "Foo.bar", None);
    next_sent(&mut remote).await;
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    target.run_after_pending_dispatches(move || flag.store(true, Ordering::SeqCst));
    tokio::time::sleep(Duration::from_millis(20)).await;
    let weak = Arc::downgrade(&target);

    // Act
    drop(target);

    // Assert
    assert!(weak.upgrade().is_none());
    let outcome = timeout(WAIT, reply).await.unwrap();
    assert!(outcome.unwrap_err().is_connection_closed());
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_diagnostics_options_do_not_change_outcomes() {
    // Arrange: every diagnostics switch on
    let options = BackendOptions {
        dump_protocol_messages: true,
        dump_time_stats: true,
        suppress_request_errors: true,
        ..BackendOptions::default()
    };
    let (factory, mut remote) = in_process_pair();
    let target = Target::connect(Arc::new(registry()), options, true, factory).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    target.register_dispatcher("Foo", forwarding_handler("h", &["bazHappened"], tx));
    let reply = target.invoke("Foo", "Foo.bar", None);
    next_sent(&mut remote).await;

    // Act
    remote.deliver(json!({"method": "Foo.bazHappened", "params": {"c": 5}}));
    remote.deliver(json!({"id": 1, "error": {"code": -1, "message": "nope"}}));

    // Assert
    let (_, _, args) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(args.get(0), Some(&json!(5)));
    assert_eq!(timeout(WAIT, reply).await.unwrap().unwrap_err().code(), Some(-1));
    assert!(target.is_node_js());
}
