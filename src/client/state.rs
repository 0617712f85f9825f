use super::stats::ConnectionMetadata;
use crate::infrastructure::{MessageQueue, RateLimiter, TaskManager};

/// Consolidated mutable state for the client.
/// A single struct behind one lock keeps the snapshot in `get_stats`
/// consistent and reduces lock juggling.
pub struct ClientState {
    /// Current ref counter for outbound message refs
    pub ref_counter: u64,

    /// Ref of the heartbeat ping still awaiting its pong, if any
    pub pending_heartbeat_ref: Option<String>,

    /// Identity and counters of the live connection; `None` while closed
    pub metadata: Option<ConnectionMetadata>,

    /// Consecutive failed open attempts since the last success
    pub reconnect_attempts: u32,

    /// Successful re-opens over the life of the client
    pub total_reconnects: u64,

    /// Whether the disconnect was manual (prevents auto-reconnect)
    pub was_manual_disconnect: bool,

    /// Outbound message-rate guard
    pub rate_limiter: RateLimiter,

    /// Outbound messages awaiting a live connection
    pub queue: MessageQueue,

    /// Background tasks owned by the current connection
    pub task_manager: TaskManager,
}

impl ClientState {
    pub fn new(rate_limiter: RateLimiter, queue: MessageQueue) -> Self {
        Self {
            ref_counter: 0,
            pending_heartbeat_ref: None,
            metadata: None,
            reconnect_attempts: 0,
            total_reconnects: 0,
            was_manual_disconnect: false,
            rate_limiter,
            queue,
            task_manager: TaskManager::new(),
        }
    }

    /// Generate the next outbound message ref.
    pub fn make_ref(&mut self) -> String {
        self.ref_counter += 1;
        self.ref_counter.to_string()
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        use crate::infrastructure::OverflowPolicy;
        use std::time::Duration;

        Self::new(
            RateLimiter::new(100, Duration::from_millis(10000)),
            MessageQueue::new(100, OverflowPolicy::DropOldest),
        )
    }
}
