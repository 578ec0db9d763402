// ABOUTME: Client-side subsystem: transport abstraction, connection state machine, queue, requests, handlers
// ABOUTME: client::Client composes all of these around one ClientTransport implementation

//! The resilient client (§4.6-§4.9): reconnect with backoff, outbound queueing
//! while disconnected, request/reply correlation, and multi-handler inbound
//! dispatch.

pub mod auth;
pub mod client;
pub mod handlers;
pub mod queue;
pub mod request;
pub mod state;
pub mod transport;

pub use auth::{AuthMode, TokenProvider};
pub use client::{Client, ClientConfig};
pub use handlers::{ClientErrorEvent, ClientErrorKind, HandlerRegistry};
pub use queue::{OutboundQueue, QueuePolicy};
pub use request::{ClientRequestError, RequestTracker};
pub use state::{BackoffConfig, ConnectionState};
pub use transport::{ClientTransport, InMemoryTransport};
