//! Schema types and the registry that stores them.
//!
//! - [`signature`] – parameter descriptors and command/event signatures.
//! - [`registry`] – the per-domain store of signatures and enum tables.
//! - [`loader`] – registration from a JSON protocol description.
//! - [`params`] – positional argument validation and event argument mapping.

pub mod loader;
pub mod params;
pub mod registry;
pub mod signature;

pub use loader::SchemaError;
pub use params::{build_event_args, prepare_parameters, CallArgs, EventArgs, ParameterError};
pub use registry::{AgentSchema, DispatcherSchema, EnumTable, SchemaRegistry};
pub use signature::{split_method, CommandSignature, EventSignature, ParamDescriptor, ParamType};
