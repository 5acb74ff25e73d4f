//! Protocol module containing the wire envelopes, error codes and the id counter.

pub mod envelope;
pub mod error;
pub mod ids;

pub use envelope::{
    CommandEnvelope, InboundEnvelope, InboundMessage, NotificationEnvelope, ResponseEnvelope,
};
pub use error::{ProtocolError, ResponseError, CONNECTION_CLOSED_ERROR_CODE, STUB_ERROR_CODE};
pub use ids::MessageIdCounter;
