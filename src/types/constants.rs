/// Wire event names (magic strings layer)
pub mod wire_events {
    pub const NOTIFICATION_CREATED: &str = "notification.created";
    pub const UPLOAD_PROGRESS: &str = "upload.progress";
    pub const UPLOAD_COMPLETED: &str = "upload.completed";
    pub const UPLOAD_ERROR: &str = "upload.error";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

/// Default heartbeat interval (milliseconds)
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 25000;

/// Default reconnect schedule
pub const DEFAULT_RECONNECT_BASE_DELAY: u64 = 1000;
pub const DEFAULT_RECONNECT_MAX_DELAY: u64 = 10000;
pub const DEFAULT_RECONNECT_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default outbound rate limit (messages per window)
pub const DEFAULT_RATE_LIMIT_MESSAGES: u32 = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW: u64 = 10000;

/// Max outbound queue size
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Refresh tokens this long before their expiry (milliseconds)
pub const DEFAULT_TOKEN_REFRESH_LEEWAY: u64 = 30000;
