// ABOUTME: Pub/sub subsystem: broker adapter contract, in-memory adapter, per-connection topic sets, plugin
// ABOUTME: Installed into a Router via Router::with_pubsub; ctx.pubsub() is None until it is

//! Topic subscriptions (§4.5) and publish fan-out (§4.4) layered on top of the
//! router via [`plugin::PubSubPlugin`].

pub mod adapter;
pub mod memory;
pub mod plugin;
pub mod topics;

pub use adapter::{BrokerAdapter, DeliveryCapability, PublishOptions, PublishOutcome, ReplaceOutcome};
pub use memory::InMemoryBrokerAdapter;
pub use plugin::{PubSubConfig, PubSubHandle, PubSubPlugin};
pub use topics::OptimisticTopics;
