// ABOUTME: Main library entry point for the wirelink messaging framework
// ABOUTME: Schema-driven envelopes, a pub/sub engine, a router, and a resilient client

//! # wirelink
//!
//! A schema-driven, bidirectional WebSocket messaging framework: a uniform
//! `{type, meta, payload}` envelope, a schema-indexed server router with
//! middleware and RPC reply correlation, a pub/sub engine with optimistic
//! per-connection topic sets, and a client state machine with reconnect
//! backoff, outbound queuing, and request/reply correlation.
//!
//! The WebSocket transport itself is out of scope: [`server::ServerConnection`]
//! and [`client::ClientTransport`] are the seams a host application binds to
//! whatever socket library it already uses. This crate ships in-memory test
//! doubles for both ([`server::InMemoryConnection`], [`client::InMemoryTransport`]).
//!
//! ## Quick start
//!
//! ```rust
//! use wirelink::prelude::*;
//! # use std::sync::Arc;
//! # async fn example() -> wirelink::error::Result<()> {
//! let mut router = Router::new();
//! let schema = JsonMessageSchema::new(
//!     "PING",
//!     serde_json::json!({"type": "object", "properties": {}}),
//!     None,
//! )?;
//! router.on(schema, |ctx| async move {
//!     ctx.send("PONG", Meta::new(), None::<()>).await
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod pubsub;
pub mod ring_buffer;
pub mod rpc;
pub mod server;
pub mod time;

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly-imported types, mirroring what a typical router or client
/// implementation needs.
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::client::{Client, ClientConfig, ClientRequestError, ConnectionState};
    pub use crate::envelope::{Envelope, Meta, MessageSchema, RawEnvelope};
    pub use crate::error::{Result, WirelinkError};
    pub use crate::pubsub::{BrokerAdapter, InMemoryBrokerAdapter, PubSubConfig};
    pub use crate::rpc::{RpcError, RpcErrorCode};
    pub use crate::server::{Context, Router};

    #[cfg(feature = "validation")]
    pub use crate::envelope::JsonMessageSchema;
}
