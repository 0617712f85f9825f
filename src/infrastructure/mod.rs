// Infrastructure module - background services and connection plumbing
pub mod backoff;
pub mod heartbeat;
pub mod queue;
pub mod rate_limit;
pub mod task_manager;

pub use backoff::ReconnectPolicy;
pub use heartbeat::HeartbeatManager;
pub use queue::{MessageQueue, OverflowPolicy, QueuedMessage};
pub use rate_limit::{RateLimitPolicy, RateLimitSnapshot, RateLimiter};
pub use task_manager::TaskManager;
