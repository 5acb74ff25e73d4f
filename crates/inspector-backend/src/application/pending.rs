//! The pending-call table.
//!
//! Between sending a command and receiving its response, the caller's reply
//! channel lives here, keyed by message id.  The table is the only place a
//! reply can be completed from, and completing consumes the entry, so each
//! call completes at most once.
//!
//! # Pending count
//!
//! Alongside the table the number of outstanding calls is published on a
//! `tokio::sync::watch` channel.  Anyone can subscribe and wait for the count
//! to reach zero; that is how quiescence is signalled without polling.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tracing::trace;

use crate::domain::CallError;

type Outcome = Result<Value, CallError>;

/// One outstanding command, tagged for diagnostics.
#[derive(Debug)]
pub struct PendingCall {
    /// Domain the command belongs to (`"Network"`).
    pub domain: String,
    /// Fully-qualified method (`"Network.enable"`).
    pub method: String,
    /// When the envelope was handed to the connection.
    pub sent_at: Instant,
    reply: oneshot::Sender<Outcome>,
}

impl PendingCall {
    /// Creates a pending call and the future its caller awaits.
    pub fn new(domain: impl Into<String>, method: impl Into<String>) -> (Self, ReplyFuture) {
        let method = method.into();
        let (reply, rx) = oneshot::channel();
        let future = ReplyFuture {
            rx,
            method: method.clone(),
        };
        let call = Self {
            domain: domain.into(),
            method,
            sent_at: Instant::now(),
            reply,
        };
        (call, future)
    }

    /// Time since the command was sent.
    pub fn elapsed(&self) -> Duration {
        self.sent_at.elapsed()
    }

    /// Completes the call.  Consumes it, so a second completion cannot compile.
    pub fn complete(self, outcome: Outcome) {
        if self.reply.send(outcome).is_err() {
            trace!(method = %self.method, "caller dropped its reply future");
        }
    }

    /// Completes the call with the connection-closed error.
    ///
    /// This is the one path used both when a command is issued without a
    /// live connection and when a target disconnects with calls in flight.
    pub fn fail_connection_closed(self) {
        let error = CallError::connection_closed(self.method.clone());
        self.complete(Err(error));
    }
}

/// The deferred result of one command.
///
/// Resolves when the response arrives or the target disconnects.  There is no
/// timeout; wrap it in `tokio::time::timeout` if one is needed.
#[derive(Debug)]
#[must_use = "a reply future does nothing unless awaited"]
pub struct ReplyFuture {
    rx: oneshot::Receiver<Outcome>,
    method: String,
}

impl ReplyFuture {
    /// The fully-qualified method this reply belongs to.
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl Future for ReplyFuture {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // A dropped sender means the target went away without completing.
            Poll::Ready(Err(_)) => Poll::Ready(Err(CallError::connection_closed(this.method.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Outstanding calls of one target, keyed by message id.
#[derive(Debug)]
pub struct PendingCalls {
    calls: Mutex<HashMap<u64, PendingCall>>,
    count: watch::Sender<usize>,
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingCalls {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            calls: Mutex::new(HashMap::new()),
            count,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, PendingCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a call and bumps the pending count.
    pub fn insert(&self, id: u64, call: PendingCall) {
        let mut calls = self.lock();
        let previous = calls.insert(id, call);
        debug_assert!(previous.is_none(), "message id {id} issued twice");
        self.count.send_replace(calls.len());
    }

    /// Removes the call for `id`.
    ///
    /// The pending count is *not* lowered yet; call
    /// [`publish_count`](Self::publish_count) once the call has been
    /// completed, so that quiescence is never observed before the caller's
    /// reply is in flight.
    pub fn take(&self, id: u64) -> Option<PendingCall> {
        self.lock().remove(&id)
    }

    /// Publishes the current table size as the pending count.
    pub fn publish_count(&self) {
        let len = self.lock().len();
        self.count.send_replace(len);
    }

    /// Empties the table, returning every call in id order.
    ///
    /// As with [`take`](Self::take), the caller publishes the new count after
    /// completing the drained calls.
    pub fn drain(&self) -> Vec<(u64, PendingCall)> {
        let mut drained: Vec<(u64, PendingCall)> = self.lock().drain().collect();
        drained.sort_unstable_by_key(|(id, _)| *id);
        drained
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last published pending count.
    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Subscribes to pending-count changes.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
