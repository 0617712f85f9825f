use crate::client::{ClientState, ConnectionManager, ConnectionState};
use crate::types::constants::{DEFAULT_HEARTBEAT_INTERVAL, wire_events};
use crate::types::message::ClientMessage;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use tokio::time::{self, MissedTickBehavior};

/// Periodic ping/pong liveness check over the transport.
///
/// Each tick sends a ping carrying a fresh ref and records it as pending;
/// the router clears the pending ref when the matching pong arrives. A ref
/// still pending at the next tick means the reply was missed, which is
/// treated as a transport failure so half-open connections the transport
/// itself never reports are torn down and reconnected.
pub struct HeartbeatManager {
    interval: Duration,
    connection: Weak<ConnectionManager>,
    state: Arc<RwLock<ClientState>>,
}

impl HeartbeatManager {
    pub fn new(connection: Weak<ConnectionManager>, state: Arc<RwLock<ClientState>>) -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL),
            connection,
            state,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs until the connection leaves `Connected` or a pong is missed.
    pub async fn run(self) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(connection) = self.connection.upgrade() else {
                break;
            };
            if connection.state() != ConnectionState::Connected {
                break;
            }

            let missed = self.state.read().pending_heartbeat_ref.is_some();
            if missed {
                tracing::warn!("heartbeat reply missed, treating connection as lost");
                connection.clear_writer().await;
                connection.set_failure(
                    ConnectionState::Reconnecting,
                    "heartbeat timeout".to_string(),
                );
                break;
            }

            let ping_ref = self.state.write().make_ref();
            let ping = ClientMessage::new(wire_events::PING, serde_json::json!({}))
                .with_ref(ping_ref.clone());
            let json = match serde_json::to_string(&ping) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("failed to encode heartbeat ping: {}", e);
                    continue;
                }
            };

            match connection.send_text(json).await {
                Ok(()) => {
                    let mut state = self.state.write();
                    state.pending_heartbeat_ref = Some(ping_ref.clone());
                    if let Some(metadata) = state.metadata.as_mut() {
                        metadata.last_heartbeat = Some(SystemTime::now());
                    }
                    tracing::debug!("sent heartbeat ping with ref {}", ping_ref);
                }
                Err(e) => {
                    tracing::error!("failed to send heartbeat ping: {}", e);
                }
            }
        }
        tracing::debug!("heartbeat task finished");
    }
}
