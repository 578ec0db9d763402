// ABOUTME: Per-connection optimistic topic set with staged batch apply and rollback (§4.5)
// ABOUTME: Local state is mutated only after every adapter call in a batch has succeeded

//! A connection's subscriptions are tracked twice: once locally (so `has`/`size`
//! are synchronous) and once in the broker adapter (so other instances see
//! them). Batch operations stage the adapter calls first and only commit the
//! local set if every one of them lands; a failure partway through triggers
//! compensating calls for everything that already succeeded, in reverse order.

use super::adapter::BrokerAdapter;
use crate::cancel::CancelToken;
use crate::error::{Result, WirelinkError};
use std::sync::Arc;
use tokio::sync::Mutex;

struct OrderedSet {
    order: Vec<String>,
}

impl OrderedSet {
    fn new() -> Self {
        Self { order: Vec::new() }
    }

    fn contains(&self, topic: &str) -> bool {
        self.order.iter().any(|t| t == topic)
    }

    fn insert(&mut self, topic: String) {
        if !self.contains(&topic) {
            self.order.push(topic);
        }
    }

    fn remove(&mut self, topic: &str) {
        self.order.retain(|t| t != topic);
    }
}

/// Per-connection topic set (§4.5). One instance per open connection; the
/// pub/sub plugin creates it on `onOpen` and drops it on `onClose`.
pub struct OptimisticTopics {
    client_id: String,
    adapter: Arc<dyn BrokerAdapter>,
    max_topics: usize,
    local: Mutex<OrderedSet>,
}

fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty()
}

impl OptimisticTopics {
    pub fn new(client_id: impl Into<String>, adapter: Arc<dyn BrokerAdapter>, max_topics: usize) -> Self {
        Self {
            client_id: client_id.into(),
            adapter,
            max_topics,
            local: Mutex::new(OrderedSet::new()),
        }
    }

    fn check_cancelled(cancel: Option<&CancelToken>) -> Result<()> {
        if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
            return Err(WirelinkError::Cancelled);
        }
        Ok(())
    }

    pub async fn has(&self, topic: &str) -> bool {
        self.local.lock().await.contains(topic)
    }

    pub async fn size(&self) -> usize {
        self.local.lock().await.order.len()
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.local.lock().await.order.clone()
    }

    pub async fn subscribe(&self, topic: String, cancel: Option<&CancelToken>) -> Result<()> {
        self.subscribe_many(vec![topic], cancel).await
    }

    pub async fn unsubscribe(&self, topic: String, cancel: Option<&CancelToken>) -> Result<()> {
        self.unsubscribe_many(vec![topic], cancel).await
    }

    /// Stage adapter `subscribe` calls for every not-yet-present topic, in
    /// order; on the k-th failure, compensate with `unsubscribe` for the
    /// topics that already succeeded, then return the original failure
    /// wrapped with rollback telemetry.
    pub async fn subscribe_many(&self, topics: Vec<String>, cancel: Option<&CancelToken>) -> Result<()> {
        Self::check_cancelled(cancel)?;
        for topic in &topics {
            if !is_valid_topic(topic) {
                return Err(WirelinkError::validation(format!("invalid topic '{}'", topic)));
            }
        }

        let mut guard = self.local.lock().await;
        let new_topics: Vec<String> = topics
            .into_iter()
            .filter(|t| !guard.contains(t))
            .collect();

        if guard.order.len() + new_topics.len() > self.max_topics {
            return Err(WirelinkError::resource_exhausted(format!(
                "subscribing would exceed max_topics ({})",
                self.max_topics
            )));
        }

        let mut committed = Vec::with_capacity(new_topics.len());
        for topic in &new_topics {
            Self::check_cancelled(cancel)?;
            match self.adapter.subscribe(&self.client_id, topic).await {
                Ok(()) => committed.push(topic.clone()),
                Err(e) => {
                    return Err(self.rollback_subscribes(committed, e).await);
                }
            }
        }

        for topic in new_topics {
            guard.insert(topic);
        }
        Ok(())
    }

    pub async fn unsubscribe_many(&self, topics: Vec<String>, cancel: Option<&CancelToken>) -> Result<()> {
        Self::check_cancelled(cancel)?;

        let mut guard = self.local.lock().await;
        let present: Vec<String> = topics.into_iter().filter(|t| guard.contains(t)).collect();

        let mut committed = Vec::with_capacity(present.len());
        for topic in &present {
            Self::check_cancelled(cancel)?;
            match self.adapter.unsubscribe(&self.client_id, topic).await {
                Ok(()) => committed.push(topic.clone()),
                Err(e) => {
                    return Err(self.rollback_unsubscribes(committed, e).await);
                }
            }
        }

        for topic in present {
            guard.remove(&topic);
        }
        Ok(())
    }

    /// Replace the whole set with `target`: computed removals are applied
    /// first, then additions; a failure during either phase rolls back
    /// whatever that phase already committed.
    pub async fn set(&self, target: Vec<String>, cancel: Option<&CancelToken>) -> Result<()> {
        Self::check_cancelled(cancel)?;
        for topic in &target {
            if !is_valid_topic(topic) {
                return Err(WirelinkError::validation(format!("invalid topic '{}'", topic)));
            }
        }
        if target.len() > self.max_topics {
            return Err(WirelinkError::resource_exhausted(format!(
                "target set exceeds max_topics ({})",
                self.max_topics
            )));
        }

        let current = self.snapshot().await;
        let removed: Vec<String> = current.iter().filter(|t| !target.contains(t)).cloned().collect();
        let added: Vec<String> = target.iter().filter(|t| !current.contains(t)).cloned().collect();

        self.unsubscribe_many(removed.clone(), cancel).await?;

        if let Err(e) = self.subscribe_many(added, cancel).await {
            // The removal phase already committed against the adapter and
            // local state; restore it so a failure in the addition phase
            // doesn't leave the set half-applied.
            return Err(self.restore_removed(removed, e).await);
        }
        Ok(())
    }

    /// Re-subscribe topics an already-committed removal phase took out, after
    /// the following addition phase failed. Any restoration failures are
    /// folded into the original error's rollback telemetry rather than
    /// silently dropped.
    async fn restore_removed(&self, removed: Vec<String>, original: WirelinkError) -> WirelinkError {
        let mut still_failed = Vec::new();
        for topic in removed.into_iter().rev() {
            match self.adapter.subscribe(&self.client_id, &topic).await {
                Ok(()) => self.local.lock().await.insert(topic),
                Err(_) => still_failed.push(topic),
            }
        }
        if still_failed.is_empty() {
            return original;
        }
        let message = match &original {
            WirelinkError::TopicSetRollback { message, .. } => message.clone(),
            other => format!("topic set update failed: {}", other),
        };
        WirelinkError::TopicSetRollback {
            message,
            rollback_failed: true,
            failed_rollback_topics: still_failed,
        }
    }

    pub async fn clear(&self, cancel: Option<&CancelToken>) -> Result<()> {
        let current = self.snapshot().await;
        self.unsubscribe_many(current, cancel).await
    }

    /// Tear down every remaining subscription unconditionally, best-effort,
    /// used on connection close where there is no longer a caller to report
    /// a rollback failure to.
    pub async fn replace_with_empty(&self) -> Result<()> {
        let current = self.snapshot().await;
        self.adapter.replace(&self.client_id, &[]).await?;
        let mut guard = self.local.lock().await;
        for topic in current {
            guard.remove(&topic);
        }
        Ok(())
    }

    async fn rollback_subscribes(&self, committed: Vec<String>, original: WirelinkError) -> WirelinkError {
        let mut failed = Vec::new();
        for topic in committed.into_iter().rev() {
            if self.adapter.unsubscribe(&self.client_id, &topic).await.is_err() {
                failed.push(topic);
            }
        }
        Self::wrap_rollback(original, failed)
    }

    async fn rollback_unsubscribes(&self, committed: Vec<String>, original: WirelinkError) -> WirelinkError {
        let mut failed = Vec::new();
        for topic in committed.into_iter().rev() {
            if self.adapter.subscribe(&self.client_id, &topic).await.is_err() {
                failed.push(topic);
            }
        }
        Self::wrap_rollback(original, failed)
    }

    fn wrap_rollback(original: WirelinkError, failed_rollback_topics: Vec<String>) -> WirelinkError {
        let rollback_failed = !failed_rollback_topics.is_empty();
        WirelinkError::TopicSetRollback {
            message: format!("topic set update failed: {}", original),
            rollback_failed,
            failed_rollback_topics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::memory::InMemoryBrokerAdapter;
    use async_trait::async_trait;
    use crate::envelope::RawEnvelope;
    use crate::pubsub::adapter::{PublishOptions, PublishOutcome, ReplaceOutcome};

    struct FailingAdapter {
        fail_on: String,
    }

    #[async_trait]
    impl BrokerAdapter for FailingAdapter {
        async fn publish(&self, _topic: &str, _e: &RawEnvelope, _o: &PublishOptions) -> Result<PublishOutcome> {
            unreachable!()
        }
        async fn subscribe(&self, _client_id: &str, topic: &str) -> Result<()> {
            if topic == self.fail_on {
                Err(WirelinkError::adapter("boom"))
            } else {
                Ok(())
            }
        }
        async fn unsubscribe(&self, _client_id: &str, _topic: &str) -> Result<()> {
            Ok(())
        }
        async fn replace(&self, _client_id: &str, _topics: &[String]) -> Result<ReplaceOutcome> {
            Ok(ReplaceOutcome::default())
        }
        async fn get_subscribers(&self, _topic: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_subscribe_many_commits_local_only_after_all_succeed() {
        let adapter = Arc::new(InMemoryBrokerAdapter::new());
        let topics = OptimisticTopics::new("c1", adapter, 10);
        topics
            .subscribe_many(vec!["a".into(), "b".into()], None)
            .await
            .unwrap();
        assert_eq!(topics.size().await, 2);
        assert!(topics.has("a").await);
    }

    #[tokio::test]
    async fn test_subscribe_many_rolls_back_on_partial_failure() {
        let adapter = Arc::new(FailingAdapter { fail_on: "b".into() });
        let topics = OptimisticTopics::new("c1", adapter, 10);
        let result = topics
            .subscribe_many(vec!["a".into(), "b".into(), "c".into()], None)
            .await;
        assert!(result.is_err());
        // 'a' succeeded then was compensated; local set must stay empty.
        assert_eq!(topics.size().await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_many_over_capacity_rejected_before_any_adapter_call() {
        let adapter = Arc::new(InMemoryBrokerAdapter::new());
        let topics = OptimisticTopics::new("c1", adapter, 1);
        let result = topics
            .subscribe_many(vec!["a".into(), "b".into()], None)
            .await;
        assert!(result.is_err());
        assert_eq!(topics.size().await, 0);
    }

    #[tokio::test]
    async fn test_cancelled_token_rejects_before_mutation() {
        let adapter = Arc::new(InMemoryBrokerAdapter::new());
        let topics = OptimisticTopics::new("c1", adapter, 10);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = topics.subscribe("a".into(), Some(&cancel)).await;
        assert!(matches!(result, Err(WirelinkError::Cancelled)));
    }

    #[tokio::test]
    async fn test_set_restores_already_removed_topics_when_addition_phase_fails() {
        let adapter = Arc::new(FailingAdapter { fail_on: "c".into() });
        let topics = OptimisticTopics::new("c1", adapter, 10);
        topics.subscribe_many(vec!["a".into(), "b".into()], None).await.unwrap();

        // target drops "a" and adds "c", but "c" fails to subscribe.
        let result = topics.set(vec!["b".into(), "c".into()], None).await;
        assert!(result.is_err());

        // "a" must be back in the set, not left removed by the first phase.
        let mut snapshot = topics.snapshot().await;
        snapshot.sort();
        assert_eq!(snapshot, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_set_computes_additions_and_removals() {
        let adapter = Arc::new(InMemoryBrokerAdapter::new());
        let topics = OptimisticTopics::new("c1", adapter, 10);
        topics.subscribe_many(vec!["a".into(), "b".into()], None).await.unwrap();
        topics.set(vec!["b".into(), "c".into()], None).await.unwrap();
        let mut snapshot = topics.snapshot().await;
        snapshot.sort();
        assert_eq!(snapshot, vec!["b".to_string(), "c".to_string()]);
    }
}
