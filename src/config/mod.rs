// ABOUTME: Serializable settings for router and client, plus an optional layered file/env loader
// ABOUTME: The loader (feature "config") is ambient tooling; the settings types themselves are always available

pub mod client;
pub mod router;

#[cfg(feature = "config")]
pub mod loader;

pub use client::ClientSettings;
pub use router::RouterSettings;

#[cfg(feature = "config")]
pub use loader::load;
