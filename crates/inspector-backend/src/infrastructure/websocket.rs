//! WebSocket connection to a remote debugging endpoint.
//!
//! After the handshake the socket is split into two halves, each owned by its
//! own Tokio task:
//!
//! - **Writer task**: drains an unbounded queue of outbound texts and writes
//!   them as text frames.  `send_raw_message` only pushes onto the queue, so
//!   it never blocks the caller.
//! - **Reader task**: reads frames and reports each text frame to the target
//!   through [`ConnectionParams::on_message`].
//!
//! Whichever side notices the end of the link first reports the disconnect,
//! exactly once:
//!
//! | Cause                         | Reason reported      |
//! |-------------------------------|----------------------|
//! | handshake / TCP connect fails | `"connection failed"`|
//! | remote closes or stream ends  | `"websocket closed"` |
//! | `disconnect()` called locally | `"force disconnect"` |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, info, warn};

use crate::infrastructure::connection::{Connection, ConnectionError, ConnectionParams};

pub const REASON_CONNECTION_FAILED: &str = "connection failed";
pub const REASON_WEBSOCKET_CLOSED: &str = "websocket closed";
pub const REASON_FORCE_DISCONNECT: &str = "force disconnect";

/// Work items for the writer task.
enum Outbound {
    Text(String),
    Close(oneshot::Sender<()>),
}

/// A connection over a client WebSocket.
#[derive(Debug)]
pub struct WebSocketConnection {
    url: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outbound::Text(text) => write!(f, "Text({} bytes)", text.len()),
            Outbound::Close(_) => f.write_str("Close"),
        }
    }
}

impl WebSocketConnection {
    /// Connects to `url` (`ws://host:port/path`) and starts the reader and
    /// writer tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::WebSocket`] if the TCP connect or the
    /// WebSocket handshake fails.  The failure is also reported to `params`
    /// as `"connection failed"`.
    pub async fn open(url: &str, params: ConnectionParams) -> Result<Self, ConnectionError> {
        let (ws_stream, _response) = match connect_async(url).await {
            Ok(pair) => pair,
            Err(source) => {
                params.on_disconnect(REASON_CONNECTION_FAILED);
                return Err(ConnectionError::WebSocket {
                    url: url.to_string(),
                    source,
                });
            }
        };
        info!("WebSocket connected to {url}");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let closed = Arc::new(AtomicBool::new(false));

        // ── Writer task ───────────────────────────────────────────────────────
        let writer_params = params.clone();
        let writer_closed = Arc::clone(&closed);
        let writer_url = url.to_string();
        tokio::spawn(async move {
            while let Some(item) = outbound_rx.recv().await {
                match item {
                    Outbound::Text(text) => {
                        if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                            debug!("{writer_url}: WebSocket send failed: {e}");
                            break;
                        }
                    }
                    Outbound::Close(done) => {
                        let first = !writer_closed.swap(true, Ordering::SeqCst);
                        if let Err(e) = ws_tx.close().await {
                            debug!("{writer_url}: WebSocket close failed: {e}");
                        }
                        if first {
                            writer_params.on_disconnect(REASON_FORCE_DISCONNECT);
                        }
                        let _ = done.send(());
                        break;
                    }
                }
            }
        });

        // ── Reader task ───────────────────────────────────────────────────────
        let reader_closed = Arc::clone(&closed);
        let reader_url = url.to_string();
        tokio::spawn(async move {
            loop {
                match ws_rx.next().await {
                    Some(Ok(WsMessage::Text(text))) => params.on_message(text),
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => params.on_message(text),
                        Err(_) => warn!("{reader_url}: non-UTF-8 binary frame ignored"),
                    },
                    Some(Ok(WsMessage::Close(_))) => {
                        debug!("{reader_url}: Close frame received");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong are answered by tungstenite itself.
                    }
                    Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                        debug!("{reader_url}: stream ended");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("{reader_url}: WebSocket error: {e}");
                        break;
                    }
                }
            }
            if !reader_closed.swap(true, Ordering::SeqCst) {
                params.on_disconnect(REASON_WEBSOCKET_CLOSED);
            }
        });

        Ok(Self {
            url: url.to_string(),
            outbound,
            closed,
        })
    }

    /// A connection factory that opens a WebSocket to `url`.
    pub fn factory(
        url: impl Into<String>,
    ) -> impl FnOnce(ConnectionParams) -> BoxFuture<'static, Result<Box<dyn Connection>, ConnectionError>>
    {
        let url = url.into();
        move |params| {
            async move {
                let connection = WebSocketConnection::open(&url, params).await?;
                Ok(Box::new(connection) as Box<dyn Connection>)
            }
            .boxed()
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    fn send_raw_message(&self, message: String) {
        if self.outbound.send(Outbound::Text(message)).is_err() {
            debug!("{}: writer task gone, outbound message dropped", self.url);
        }
    }

    async fn disconnect(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let (done, wait) = oneshot::channel();
        if self.outbound.send(Outbound::Close(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
