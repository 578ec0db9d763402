// ABOUTME: Envelope wire format, normalization, and the validator adapter contract
// ABOUTME: Everything server and client agree on before a message reaches a handler

//! The `{type, meta, payload?}` envelope (§3) and its normalization rules (§4.1).

pub mod builder;
pub mod meta;
pub mod normalize;
pub mod validator;

pub use builder::{Envelope, EnvelopeBuilder, RawEnvelope};
pub use meta::Meta;
pub use normalize::{normalize_inbound, normalize_outbound};
pub use validator::{MessageSchema, ParseOutcome};

#[cfg(feature = "validation")]
pub use validator::JsonMessageSchema;
