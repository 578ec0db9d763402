// ABOUTME: Default/test BrokerAdapter — a single-process topic→subscribers map
// ABOUTME: Always reports Exact delivery capability; start() never produces remote deliveries

use super::adapter::{BoxFuture, BrokerAdapter, DeliveryCapability, PublishOptions, PublishOutcome, ReplaceOutcome, RemoteDeliveryFn, StopHandle};
use crate::envelope::RawEnvelope;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory broker adapter: no cross-process fan-out, exact subscriber counts.
/// The default adapter the pub/sub plugin uses when no external broker is wired in.
#[derive(Default)]
pub struct InMemoryBrokerAdapter {
    topics: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemoryBrokerAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrokerAdapter for InMemoryBrokerAdapter {
    async fn publish(&self, topic: &str, _envelope: &RawEnvelope, _opts: &PublishOptions) -> Result<PublishOutcome> {
        let matched = self
            .topics
            .read()
            .await
            .get(topic)
            .map(|subs| subs.len() as u64)
            .unwrap_or(0);
        Ok(PublishOutcome {
            ok: true,
            capability: DeliveryCapability::Exact,
            matched: Some(matched),
        })
    }

    async fn subscribe(&self, client_id: &str, topic: &str) -> Result<()> {
        self.topics
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .insert(client_id.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, client_id: &str, topic: &str) -> Result<()> {
        let mut topics = self.topics.write().await;
        if let Some(subs) = topics.get_mut(topic) {
            subs.remove(client_id);
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
        Ok(())
    }

    async fn replace(&self, client_id: &str, topics: &[String]) -> Result<ReplaceOutcome> {
        let target: HashSet<String> = topics.iter().cloned().collect();
        let mut guard = self.topics.write().await;

        let current: HashSet<String> = guard
            .iter()
            .filter(|(_, subs)| subs.contains(client_id))
            .map(|(topic, _)| topic.clone())
            .collect();

        let removed: Vec<String> = current.difference(&target).cloned().collect();
        let added: Vec<String> = target.difference(&current).cloned().collect();

        for topic in &removed {
            if let Some(subs) = guard.get_mut(topic) {
                subs.remove(client_id);
                if subs.is_empty() {
                    guard.remove(topic);
                }
            }
        }
        for topic in &added {
            guard.entry(topic.clone()).or_default().insert(client_id.to_string());
        }

        Ok(ReplaceOutcome {
            added,
            removed,
            total: target.len(),
        })
    }

    async fn get_subscribers(&self, topic: &str) -> Result<Vec<String>> {
        Ok(self
            .topics
            .read()
            .await
            .get(topic)
            .map(|subs| subs.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn start(&self, _on_remote_delivery: RemoteDeliveryFn) -> Result<StopHandle> {
        let stop: StopHandle = Box::new(|| -> BoxFuture<'static, ()> { Box::pin(async {}) });
        Ok(stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_then_get_subscribers() {
        let adapter = InMemoryBrokerAdapter::new();
        adapter.subscribe("c1", "room:1").await.unwrap();
        adapter.subscribe("c2", "room:1").await.unwrap();
        let mut subs = adapter.get_subscribers("room:1").await.unwrap();
        subs.sort();
        assert_eq!(subs, vec!["c1".to_string(), "c2".to_string()]);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_empty_topic() {
        let adapter = InMemoryBrokerAdapter::new();
        adapter.subscribe("c1", "room:1").await.unwrap();
        adapter.unsubscribe("c1", "room:1").await.unwrap();
        assert!(adapter.get_subscribers("room:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_computes_added_and_removed() {
        let adapter = InMemoryBrokerAdapter::new();
        adapter.subscribe("c1", "a").await.unwrap();
        adapter.subscribe("c1", "b").await.unwrap();
        let outcome = adapter
            .replace("c1", &["b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.removed, vec!["a".to_string()]);
        assert_eq!(outcome.added, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_publish_reports_exact_capability() {
        let adapter = InMemoryBrokerAdapter::new();
        adapter.subscribe("c1", "room:1").await.unwrap();
        let envelope = RawEnvelope::new("PING", crate::envelope::Meta::new(), None);
        let outcome = adapter
            .publish("room:1", &envelope, &PublishOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.capability, DeliveryCapability::Exact);
        assert_eq!(outcome.matched, Some(1));
    }
}
