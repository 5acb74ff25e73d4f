//! inspector-backend library crate.
//!
//! The client side of a JSON remote-debugging protocol: a [`Target`] talks to
//! one remote end over a [`Connection`], sends commands through per-domain
//! [`Agent`]s and delivers events to registered [`EventHandler`]s.  What the
//! commands and events look like comes from an
//! [`inspector_core::SchemaRegistry`] loaded once before any target exists.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! caller ──agent.call("enable", args)──► Target ──text──► Connection ──► remote
//!                                          ▲                  │
//! handlers ◄──EventRouter◄──notification───┤◄──message pump◄──┘
//! reply future ◄───────────response────────┘
//!
//! [inspector-backend]
//!   ├── domain/           Options and call outcomes (no I/O)
//!   ├── application/      Target, agents, routers, pending calls
//!   └── infrastructure/
//!         ├── websocket   Client WebSocket (tokio-tungstenite)
//!         ├── in_process  Remote end in the same process
//!         └── stub        Answers every command with the stub error
//! ```
//!
//! # Layer rules
//!
//! - `domain` depends on `inspector-core` only.
//! - `application` depends on `domain`, `inspector-core` and the
//!   `Connection` trait.
//! - `infrastructure` implements `Connection` with `tokio` and `tungstenite`.
//!
//! [`Target`]: application::Target
//! [`Agent`]: application::Agent
//! [`EventHandler`]: application::EventHandler
//! [`Connection`]: infrastructure::Connection

/// Domain layer: options and call outcomes.
pub mod domain;

/// Application layer: targets, agents and event routing.
pub mod application;

/// Infrastructure layer: connection implementations.
pub mod infrastructure;

/// Typed agents via `protocol_domain!`.
pub mod macros;

#[doc(hidden)]
pub mod __private {
    pub use inspector_core;
    pub use serde_json;
}
