//! Application layer for inspector-backend.
//!
//! The protocol session itself: sending commands, correlating responses and
//! fanning out events.  It decides *what* happens to every message and
//! leaves moving bytes to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Allocating message ids and tracking pending calls ([`Target`])
//! - Validating positional calls and shaping replies ([`Agent`])
//! - Routing notifications to registered handlers ([`EventRouter`])
//! - Tapping traffic for tooling ([`MessageObserver`])
//!
//! # What does NOT belong here?
//!
//! - Sockets, framing or reconnect logic (that is infrastructure)
//! - Parsing protocol descriptions (that is inspector-core)

pub mod agent;
pub mod dispatcher;
pub mod observer;
pub mod pending;
pub mod target;

pub use agent::Agent;
pub use dispatcher::{EventHandler, EventHandlerTable, EventRouter};
pub use observer::{MessageObserver, SentMessage};
pub use pending::{PendingCall, PendingCalls, ReplyFuture};
pub use target::{Target, TargetState, REASON_CONNECTION_DROPPED, REASON_DISCONNECT_REQUESTED};
