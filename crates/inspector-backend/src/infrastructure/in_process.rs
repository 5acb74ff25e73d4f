//! A connection whose remote end lives in the same process.
//!
//! [`in_process_pair`] returns a connection factory plus a [`RemoteEnd`].
//! The remote end sees every raw text the target sends and can answer with
//! responses and notifications, or drop the link.  Tests use it to play the
//! remote side; embedders can use it to host a protocol server in-process.
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use inspector_backend::application::Target;
//! use inspector_backend::domain::BackendOptions;
//! use inspector_backend::infrastructure::in_process_pair;
//! use inspector_core::SchemaRegistry;
//!
//! let (factory, mut remote) = in_process_pair();
//! let target = Target::connect(Arc::new(SchemaRegistry::new()), BackendOptions::default(), false, factory).await?;
//!
//! let reply = target.invoke("Network", "Network.enable", None);
//! let sent = remote.next_sent_json().await;
//! remote.deliver(r#"{"id":1,"result":{}}"#);
//! reply.await?;
//! # Ok(()) }
//! ```

use std::future::{ready, Ready};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use inspector_core::InboundMessage;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::infrastructure::connection::{Connection, ConnectionError, ConnectionParams};

/// Reason reported when the target itself closes an in-process link.
pub const IN_PROCESS_DISCONNECT_REASON: &str = "force disconnect";

/// The target-side half of an in-process link.
#[derive(Debug)]
pub struct InProcessConnection {
    outbound: mpsc::UnboundedSender<String>,
    params: ConnectionParams,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for InProcessConnection {
    fn send_raw_message(&self, message: String) {
        if self.closed.load(Ordering::SeqCst) {
            debug!("in-process link closed, dropping outbound message");
            return;
        }
        if self.outbound.send(message).is_err() {
            debug!("remote end dropped, outbound message discarded");
        }
    }

    async fn disconnect(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.params.on_disconnect(IN_PROCESS_DISCONNECT_REASON);
        }
    }
}

/// The remote-side half of an in-process link.
#[derive(Debug)]
pub struct RemoteEnd {
    outbound: mpsc::UnboundedReceiver<String>,
    params: Arc<OnceLock<ConnectionParams>>,
}

impl RemoteEnd {
    /// Waits for the next raw text the target sends.
    ///
    /// Returns `None` once the connection has been dropped and every sent
    /// message has been read.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Like [`next_sent`](Self::next_sent) but parsed as JSON.
    pub async fn next_sent_json(&mut self) -> Option<Value> {
        let text = self.next_sent().await?;
        serde_json::from_str(&text).ok()
    }

    /// Returns the next sent text if one is already queued.
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Delivers a message to the target.
    pub fn deliver(&self, message: impl Into<InboundMessage>) {
        match self.params.get() {
            Some(params) => params.on_message(message),
            None => warn!("in-process link not connected yet, message dropped"),
        }
    }

    /// Drops the link from the remote side.
    pub fn close(&self, reason: &str) {
        if let Some(params) = self.params.get() {
            params.on_disconnect(reason);
        }
    }

    /// Returns `true` once a target has been wired to this link.
    pub fn is_connected(&self) -> bool {
        self.params.get().is_some()
    }
}

/// The factory signature [`in_process_pair`] hands out.
pub type InProcessFactory =
    Box<dyn FnOnce(ConnectionParams) -> Ready<Result<Box<dyn Connection>, ConnectionError>> + Send>;

/// Creates a connection factory and the remote end it will be wired to.
pub fn in_process_pair() -> (InProcessFactory, RemoteEnd) {
    let (tx, rx) = mpsc::unbounded_channel();
    let slot = Arc::new(OnceLock::new());
    let remote = RemoteEnd {
        outbound: rx,
        params: Arc::clone(&slot),
    };

    let factory: InProcessFactory = Box::new(move |params: ConnectionParams| {
        // Only the first factory call wires the link; the closure is FnOnce.
        let _ = slot.set(params.clone());
        let connection: Box<dyn Connection> = Box::new(InProcessConnection {
            outbound: tx,
            params,
            closed: AtomicBool::new(false),
        });
        ready(Ok(connection))
    });

    (factory, remote)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
