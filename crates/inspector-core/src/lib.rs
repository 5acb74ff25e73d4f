//! # inspector-core
//!
//! Shared library for the inspector remote-protocol client containing the wire
//! envelopes, the schema registry, and the parameter validation rules.
//!
//! This crate has zero dependencies on async runtimes, sockets, or threads.
//! Everything in here is a pure function of its inputs, which is what lets the
//! backend crate unit-test its message pump without a live connection.
//!
//! # Architecture overview
//!
//! The remote end speaks a JSON protocol organised into *domains* (`Network`,
//! `DOM`, `Runtime`, …).  Each domain exposes *commands* (`Network.enable`)
//! that the local side invokes and *events* (`Network.requestWillBeSent`) that
//! the remote side pushes.
//!
//! - **`protocol`** – What travels over the wire: the outgoing command
//!   envelope, the incoming response/notification envelopes, the error object
//!   and its reserved codes, and the per-target message-id counter.
//!
//! - **`schema`** – What the local side knows about the remote API: parameter
//!   descriptors, command and event signatures, enum tables, the
//!   [`SchemaRegistry`] that stores them, and the rules that turn positional
//!   call arguments into a validated parameter object.

pub mod protocol;
pub mod schema;

// Re-export the most-used types at the crate root so callers can write
// `inspector_core::SchemaRegistry` instead of the full module path.
pub use protocol::envelope::{
    CommandEnvelope, InboundEnvelope, InboundMessage, NotificationEnvelope, ResponseEnvelope,
};
pub use protocol::error::{ProtocolError, ResponseError, CONNECTION_CLOSED_ERROR_CODE, STUB_ERROR_CODE};
pub use protocol::ids::MessageIdCounter;
pub use schema::params::{build_event_args, prepare_parameters, CallArgs, EventArgs, ParameterError};
pub use schema::registry::{AgentSchema, DispatcherSchema, EnumTable, SchemaRegistry};
pub use schema::loader::SchemaError;
pub use schema::signature::{
    split_method, CommandSignature, EventSignature, ParamDescriptor, ParamType,
};
