// ABOUTME: Outbound queue buffering frames sent while disconnected (§4.7)
// ABOUTME: drop-oldest/drop-newest/off policies bound memory during long reconnect stretches

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    DropOldest,
    DropNewest,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    DroppedIncoming,
    DroppedOldest(String),
    Rejected,
}

/// Buffers frames while the client is not `Open`; drains in FIFO order once
/// reconnected.
pub struct OutboundQueue {
    policy: QueuePolicy,
    capacity: usize,
    items: VecDeque<String>,
}

impl OutboundQueue {
    pub fn new(policy: QueuePolicy, capacity: usize) -> Self {
        Self {
            policy,
            capacity,
            items: VecDeque::with_capacity(capacity.min(64)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Attempt to enqueue `frame`. With policy `Off`, queuing is disabled
    /// entirely and every call is rejected (the caller should fail the send
    /// immediately instead of buffering it).
    pub fn enqueue(&mut self, frame: String) -> EnqueueOutcome {
        if self.policy == QueuePolicy::Off {
            return EnqueueOutcome::Rejected;
        }
        if self.items.len() < self.capacity {
            self.items.push_back(frame);
            return EnqueueOutcome::Enqueued;
        }
        match self.policy {
            QueuePolicy::DropOldest => {
                let dropped = self.items.pop_front();
                self.items.push_back(frame);
                EnqueueOutcome::DroppedOldest(dropped.unwrap_or_default())
            }
            QueuePolicy::DropNewest => EnqueueOutcome::DroppedIncoming,
            QueuePolicy::Off => unreachable!(),
        }
    }

    pub fn drain(&mut self) -> Vec<String> {
        self.items.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_oldest_evicts_front_at_capacity() {
        let mut queue = OutboundQueue::new(QueuePolicy::DropOldest, 2);
        queue.enqueue("a".into());
        queue.enqueue("b".into());
        let outcome = queue.enqueue("c".into());
        assert_eq!(outcome, EnqueueOutcome::DroppedOldest("a".into()));
        assert_eq!(queue.drain(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_drop_newest_rejects_incoming_at_capacity() {
        let mut queue = OutboundQueue::new(QueuePolicy::DropNewest, 1);
        queue.enqueue("a".into());
        let outcome = queue.enqueue("b".into());
        assert_eq!(outcome, EnqueueOutcome::DroppedIncoming);
        assert_eq!(queue.drain(), vec!["a".to_string()]);
    }

    #[test]
    fn test_off_policy_never_buffers() {
        let mut queue = OutboundQueue::new(QueuePolicy::Off, 10);
        let outcome = queue.enqueue("a".into());
        assert_eq!(outcome, EnqueueOutcome::Rejected);
        assert!(queue.is_empty());
    }
}
