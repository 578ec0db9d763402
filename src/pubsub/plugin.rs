// ABOUTME: Pub/sub plugin orchestration: per-connection topic sets, publish fan-out, excludeSelf
// ABOUTME: Installed into a Router via Router::with_pubsub; augments each dispatch Context

//! Wires a [`BrokerAdapter`] into the router: creates an [`OptimisticTopics`]
//! per connection, drives local delivery for both locally- and
//! remotely-originated publishes, and sanitizes the `excludeClientId` meta key
//! so only the plugin itself ever sets it.

use super::adapter::{BrokerAdapter, PublishOptions, PublishOutcome};
use super::topics::OptimisticTopics;
use crate::constants::META_KEY_EXCLUDE_CLIENT_ID;
use crate::envelope::{Meta, MessageSchema, RawEnvelope};
use crate::error::{Result, WirelinkError};
use crate::server::connection::ConnectionRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

pub struct PubSubConfig {
    pub max_topics_per_connection: usize,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            max_topics_per_connection: crate::constants::DEFAULT_MAX_TOPICS_PER_CONNECTION,
        }
    }
}

/// Orchestrates topic membership and publish fan-out across all connections of
/// one router.
pub struct PubSubPlugin {
    adapter: Arc<dyn BrokerAdapter>,
    connections: Arc<ConnectionRegistry>,
    config: PubSubConfig,
    per_connection: RwLock<HashMap<String, Arc<OptimisticTopics>>>,
}

impl PubSubPlugin {
    pub fn new(adapter: Arc<dyn BrokerAdapter>, connections: Arc<ConnectionRegistry>, config: PubSubConfig) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            connections,
            config,
            per_connection: RwLock::new(HashMap::new()),
        })
    }

    /// Start the adapter's remote-delivery pump, routing anything it hands
    /// back through the same local-delivery path a same-instance publish uses.
    pub async fn start(self: &Arc<Self>) -> Result<super::adapter::StopHandle> {
        let this = Arc::clone(self);
        self.adapter
            .start(Arc::new(move |envelope: RawEnvelope| {
                let this = Arc::clone(&this);
                Box::pin(async move {
                    if let Some(topic) = this.topic_of(&envelope) {
                        let _ = this.deliver_local(&topic, &envelope, None).await;
                    }
                })
            }))
            .await
    }

    /// Called by the router on connection open: allocate this connection's
    /// topic set.
    pub async fn on_open(&self, client_id: &str) -> Arc<OptimisticTopics> {
        let topics = Arc::new(OptimisticTopics::new(
            client_id,
            Arc::clone(&self.adapter),
            self.config.max_topics_per_connection,
        ));
        self.per_connection
            .write()
            .await
            .insert(client_id.to_string(), Arc::clone(&topics));
        topics
    }

    /// Called by the router on connection close: best-effort teardown of
    /// every subscription this connection held.
    pub async fn on_close(&self, client_id: &str) {
        if let Some(topics) = self.per_connection.write().await.remove(client_id) {
            if let Err(e) = topics.replace_with_empty().await {
                warn!(client_id, error = %e, "failed to clear subscriptions on connection close");
            }
        }
    }

    pub async fn topics_for(&self, client_id: &str) -> Option<Arc<OptimisticTopics>> {
        self.per_connection.read().await.get(client_id).cloned()
    }

    /// Publish `envelope` on `topic`: strips any caller-supplied
    /// `excludeClientId` (only the plugin sets it), forwards to the adapter
    /// for cross-instance fan-out, then delivers locally.
    pub async fn publish(
        &self,
        topic: &str,
        mut envelope: RawEnvelope,
        publisher_client_id: Option<&str>,
        exclude_self: bool,
    ) -> Result<PublishOutcome> {
        envelope.meta.remove(META_KEY_EXCLUDE_CLIENT_ID);
        if exclude_self {
            if let Some(id) = publisher_client_id {
                envelope.meta.insert(META_KEY_EXCLUDE_CLIENT_ID, serde_json::json!(id));
            }
        }

        let opts = PublishOptions {
            exclude_self,
            partition_key: None,
        };
        let outcome = self.adapter.publish(topic, &envelope, &opts).await?;
        self.deliver_local(topic, &envelope, publisher_client_id.filter(|_| exclude_self))
            .await?;
        Ok(outcome)
    }

    /// Schema-validated publish: validates `payload` against `schema` before
    /// building the envelope, then delegates to [`PubSubPlugin::publish`].
    pub async fn publish_with_schema(
        &self,
        topic: &str,
        schema: &Arc<dyn MessageSchema>,
        payload: Option<Value>,
        publisher_client_id: Option<&str>,
        exclude_self: bool,
    ) -> Result<PublishOutcome> {
        let outcome = schema.validate_payload(payload.as_ref());
        if !outcome.is_ok() {
            return Err(WirelinkError::validation(outcome.issues().join("; ")));
        }
        let envelope = RawEnvelope::new(schema.message_type(), Meta::new(), payload);
        self.publish(topic, envelope, publisher_client_id, exclude_self).await
    }

    async fn deliver_local(&self, topic: &str, envelope: &RawEnvelope, exclude: Option<&str>) -> Result<()> {
        let subscribers = self.adapter.get_subscribers(topic).await?;
        for client_id in subscribers {
            if Some(client_id.as_str()) == exclude {
                continue;
            }
            if let Some(connection) = self.connections.get(&client_id).await {
                let mut outbound = envelope.clone();
                outbound.meta.remove(META_KEY_EXCLUDE_CLIENT_ID);
                if let Ok(text) = serde_json::to_string(&outbound) {
                    let _ = connection.send_text(text).await;
                }
            }
        }
        Ok(())
    }

    fn topic_of(&self, envelope: &RawEnvelope) -> Option<String> {
        envelope
            .meta
            .get("topic")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Meta field the router exposes on a [`crate::server::context::Context`] once
/// a [`PubSubPlugin`] is installed.
#[derive(Clone)]
pub struct PubSubHandle {
    plugin: Arc<PubSubPlugin>,
    topics: Arc<OptimisticTopics>,
    client_id: String,
}

impl PubSubHandle {
    pub fn new(plugin: Arc<PubSubPlugin>, topics: Arc<OptimisticTopics>, client_id: String) -> Self {
        Self { plugin, topics, client_id }
    }

    pub fn topics(&self) -> &OptimisticTopics {
        &self.topics
    }

    pub async fn publish(&self, topic: &str, envelope: RawEnvelope, exclude_self: bool) -> Result<PublishOutcome> {
        self.plugin
            .publish(topic, envelope, Some(&self.client_id), exclude_self)
            .await
    }

    /// Schema-validated publish (§4.3): validates `payload` before it ever
    /// becomes an envelope, so a handler can no longer bypass validation by
    /// hand-building one.
    pub async fn publish_with_schema(
        &self,
        topic: &str,
        schema: &Arc<dyn MessageSchema>,
        payload: Option<Value>,
        exclude_self: bool,
    ) -> Result<PublishOutcome> {
        self.plugin
            .publish_with_schema(topic, schema, payload, Some(&self.client_id), exclude_self)
            .await
    }
}
