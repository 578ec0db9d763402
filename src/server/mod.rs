// ABOUTME: Server-side router: schema dispatch, middleware chain, connection lifecycle, pub/sub wiring
// ABOUTME: The WebSocket transport itself is a host concern; this module only needs ServerConnection

//! The router (§4.3) dispatches inbound envelopes by `type`, normalizes and
//! validates them, runs the middleware chain, and calls the registered
//! handler. Connecting a real socket library is the host application's job:
//! implement [`connection::ServerConnection`] and feed bytes to
//! [`router::Router::handle_message`].

pub mod connection;
pub mod context;
pub mod middleware;
pub mod router;

pub use connection::{ConnectionRegistry, InMemoryConnection, ServerConnection};
pub use context::{Context, ErrorEvent, ErrorKind};
pub use middleware::{Middleware, Next};
pub use router::Router;
