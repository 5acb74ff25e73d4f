//! The transport seam between a target and the remote end.
//!
//! A target never talks to a socket directly.  It is given a *factory*: an
//! async closure that receives a [`ConnectionParams`] and returns a live
//! [`Connection`].  The connection sends raw text outward through
//! [`Connection::send_raw_message`] and reports everything coming back
//! through the params:
//!
//! ```text
//! Target ──send_raw_message(text)──► Connection ──► remote end
//! Target ◄──── message pump ◄── ConnectionParams::on_message / on_disconnect
//! ```
//!
//! # For beginners: why a channel instead of a callback?
//!
//! The params are backed by an unbounded tokio channel.  Whatever thread or
//! task the transport reads on, events land in one queue and the target's
//! message pump handles them one at a time, in arrival order.  That gives
//! the target a single, sequential view of its inbound traffic without any
//! extra locking in the transport.

use async_trait::async_trait;
use inspector_core::InboundMessage;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while opening a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The WebSocket handshake or TCP connect failed.
    #[error("WebSocket connect to {url} failed: {source}")]
    WebSocket {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// The factory could not produce a connection for another reason.
    #[error("connection refused: {0}")]
    Refused(String),
}

/// A live link to the remote end.
///
/// A target owns exactly one connection for its whole lifetime.
/// `disconnect` is terminal: after it completes the connection must not
/// deliver further messages.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Sends one serialised envelope.  Never blocks.
    fn send_raw_message(&self, message: String);

    /// Closes the link.  Completes once the transport has shut down.
    async fn disconnect(&self);
}

/// One event reported by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Message(InboundMessage),
    Disconnect(String),
}

/// The handle a connection uses to report inbound traffic to its target.
///
/// Cheap to clone; every clone feeds the same target.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionParams {
    /// Creates a params handle and the receiver the target's pump reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    /// Reports one inbound message (raw text or an already-parsed object).
    pub fn on_message(&self, message: impl Into<InboundMessage>) {
        // A closed channel means the target is gone; there is nobody to tell.
        let _ = self.events.send(ConnectionEvent::Message(message.into()));
    }

    /// Reports that the link is gone.
    pub fn on_disconnect(&self, reason: impl Into<String>) {
        let _ = self.events.send(ConnectionEvent::Disconnect(reason.into()));
    }

    /// Returns `true` if the target side has stopped listening.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
