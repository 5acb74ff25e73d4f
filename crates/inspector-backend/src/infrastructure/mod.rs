//! Infrastructure layer for inspector-backend.
//!
//! Everything that moves bytes: the [`Connection`] seam a target talks
//! through, and the concrete transports behind it.
//!
//! # Responsibilities
//!
//! - Defining the `Connection` trait and the params a factory receives
//! - Hosting a remote end in-process (tests, embedding)
//! - Answering every command with the stub error when there is no backend
//! - Opening a client WebSocket and running its reader/writer tasks
//!
//! # What does NOT belong here?
//!
//! - Id allocation, pending calls, response correlation (application layer)
//! - Parameter validation (inspector-core)

pub mod connection;
pub mod in_process;
pub mod stub;
pub mod websocket;

pub use connection::{Connection, ConnectionError, ConnectionEvent, ConnectionParams};
pub use in_process::{in_process_pair, InProcessConnection, InProcessFactory, RemoteEnd};
pub use stub::StubConnection;
pub use websocket::WebSocketConnection;
