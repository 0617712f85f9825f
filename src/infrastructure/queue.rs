use crate::types::{ClientMessage, RealtimeError, Result};
use std::collections::VecDeque;
use tokio::time::Instant;

/// What happens when a message is enqueued into a full queue.
///
/// The policy is fixed for the life of the queue instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oldest queued entry to make room (lossy, latest wins).
    #[default]
    DropOldest,
    /// Reject the new entry with `RealtimeError::QueueFull`.
    RejectNew,
}

/// An outbound message waiting for a live connection.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub message: ClientMessage,
    pub queued_at: Instant,
}

/// Bounded FIFO of outbound messages awaiting transmission.
///
/// Draining preserves enqueue order; admission against the rate window is
/// the caller's responsibility, re-applied per message.
#[derive(Debug)]
pub struct MessageQueue {
    items: VecDeque<QueuedMessage>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl MessageQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            policy,
        }
    }

    /// Append a message, applying the overflow policy at capacity.
    pub fn push(&mut self, message: ClientMessage) -> Result<()> {
        if self.items.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    self.items.pop_front();
                    tracing::warn!("message queue full, dropped oldest entry");
                }
                OverflowPolicy::RejectNew => return Err(RealtimeError::QueueFull),
            }
        }

        self.items.push_back(QueuedMessage {
            message,
            queued_at: Instant::now(),
        });
        Ok(())
    }

    pub fn peek(&self) -> Option<&QueuedMessage> {
        self.items.front()
    }

    pub fn pop(&mut self) -> Option<QueuedMessage> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Discard all queued messages, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(n: u32) -> ClientMessage {
        ClientMessage::new("chat.message", serde_json::json!({ "n": n }))
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let mut queue = MessageQueue::new(10, OverflowPolicy::DropOldest);
        for n in 0..3 {
            queue.push(msg(n)).unwrap();
        }

        let drained: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|q| q.message.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(drained, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_drop_oldest_at_capacity() {
        let mut queue = MessageQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(msg(0)).unwrap();
        queue.push(msg(1)).unwrap();
        queue.push(msg(2)).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().message.payload["n"], 1);
        assert_eq!(queue.pop().unwrap().message.payload["n"], 2);
    }

    #[tokio::test]
    async fn test_reject_new_at_capacity() {
        let mut queue = MessageQueue::new(2, OverflowPolicy::RejectNew);
        queue.push(msg(0)).unwrap();
        queue.push(msg(1)).unwrap();

        assert!(matches!(queue.push(msg(2)), Err(RealtimeError::QueueFull)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().unwrap().message.payload["n"], 0);
    }

    #[tokio::test]
    async fn test_clear_reports_dropped_count() {
        let mut queue = MessageQueue::new(10, OverflowPolicy::DropOldest);
        queue.push(msg(0)).unwrap();
        queue.push(msg(1)).unwrap();

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
