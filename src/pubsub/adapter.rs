// ABOUTME: Broker adapter interface (§4.4) — the abstract delivery substrate the pub/sub plugin drives
// ABOUTME: Concrete adapters (Redis, etc) are out of scope; InMemoryBrokerAdapter is the default/test one

//! Any pub/sub substrate that can answer these five operations satisfies the
//! plugin's dependency. [`crate::pubsub::memory::InMemoryBrokerAdapter`] is the
//! one concrete implementation this crate ships.

use crate::envelope::RawEnvelope;
use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback the adapter invokes when a message published from another instance
/// must be delivered to connections local to this one.
pub type RemoteDeliveryFn = std::sync::Arc<dyn Fn(RawEnvelope) -> BoxFuture<'static, ()> + Send + Sync>;

/// Returned by [`BrokerAdapter::start`]; call (and drop) exactly once to stop
/// the remote-delivery pump.
pub type StopHandle = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// `exact` | `approximate` | `unknown` delivery-count confidence (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryCapability {
    Exact,
    Approximate,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub exclude_self: bool,
    pub partition_key: Option<String>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            exclude_self: false,
            partition_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub ok: bool,
    pub capability: DeliveryCapability,
    pub matched: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaceOutcome {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub total: usize,
}

/// The broker-adapter contract (§4.4).
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Fan out `envelope` to this topic's subscribers, local and/or remote.
    async fn publish(&self, topic: &str, envelope: &RawEnvelope, opts: &PublishOptions) -> Result<PublishOutcome>;

    async fn subscribe(&self, client_id: &str, topic: &str) -> Result<()>;

    async fn unsubscribe(&self, client_id: &str, topic: &str) -> Result<()>;

    /// Atomic replace-all, used on connection teardown (`replace(clientId, [])`).
    async fn replace(&self, client_id: &str, topics: &[String]) -> Result<ReplaceOutcome>;

    async fn get_subscribers(&self, topic: &str) -> Result<Vec<String>>;

    /// Optional; called at plugin init. Default: no remote delivery, immediate no-op stop.
    async fn start(&self, _on_remote_delivery: RemoteDeliveryFn) -> Result<StopHandle> {
        Ok(Box::new(|| Box::pin(async {})))
    }
}
