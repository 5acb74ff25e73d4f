//! Domain layer for inspector-backend.
//!
//! Plain types with no I/O: the diagnostics options a target is built with,
//! and the outcome types every command call completes with.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio` channel, task or socket type
//! - The target and its message pump (that is the application layer)

pub mod config;
pub mod errors;

pub use config::{BackendOptions, ConfigError};
pub use errors::{CallError, CallResultExt, ProtocolResponse};
