use super::connection::ConnectionState;
use crate::infrastructure::RateLimitSnapshot;
use std::time::SystemTime;

/// Identity, timers and counters of the live connection.
///
/// Created on every successful open with a fresh `connection_id`, refreshed
/// on heartbeat/send/receive, cleared on close.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionMetadata {
    pub connection_id: String,
    pub user_id: Option<String>,
    pub connected_at: SystemTime,
    pub last_heartbeat: Option<SystemTime>,
    pub total_messages_sent: u64,
    pub total_messages_received: u64,
    pub total_reconnects: u64,
}

impl ConnectionMetadata {
    pub fn new(user_id: Option<String>, total_reconnects: u64) -> Self {
        Self {
            connection_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            connected_at: SystemTime::now(),
            last_heartbeat: None,
            total_messages_sent: 0,
            total_messages_received: 0,
            total_reconnects,
        }
    }
}

/// Point-in-time snapshot of the client, produced by `get_stats`.
///
/// Reading it never mutates any internal counter. `active_listeners`
/// includes the internal store reducers wired at build time.
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub queued_messages: usize,
    pub active_listeners: usize,
    pub subscriptions: usize,
    pub metadata: Option<ConnectionMetadata>,
    pub rate_limiting: RateLimitSnapshot,
}
