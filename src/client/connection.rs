use crate::transport::TransportSink;
use crate::types::{RealtimeError, Result};
use tokio::sync::{Mutex, watch};

/// Connection lifecycle state. Owned exclusively by the client; consumers
/// only read snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

/// State plus the last transport/auth failure, published on a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_error: Option<String>,
}

/// Owns the transport write half and publishes connection status changes.
///
/// The write half lives behind an async mutex because sends must hold it
/// across an await; everything else here is synchronous snapshot access.
pub struct ConnectionManager {
    writer: Mutex<Option<Box<dyn TransportSink>>>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (status_tx, _status_rx) = watch::channel(ConnectionStatus {
            state: ConnectionState::Disconnected,
            last_error: None,
        });
        Self {
            writer: Mutex::new(None),
            status_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status_tx.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// New receiver observing every subsequent status change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Transition state, keeping the last error except when entering
    /// `Connected`, which clears it.
    pub fn set_state(&self, state: ConnectionState) {
        self.status_tx.send_modify(|status| {
            status.state = state;
            if state == ConnectionState::Connected {
                status.last_error = None;
            }
        });
    }

    /// Transition state and record the failure that caused it.
    pub fn set_failure(&self, state: ConnectionState, reason: String) {
        self.status_tx.send_modify(|status| {
            status.state = state;
            status.last_error = Some(reason);
        });
    }

    /// Install the write half of a freshly opened transport.
    pub async fn set_writer(&self, sink: Box<dyn TransportSink>) {
        *self.writer.lock().await = Some(sink);
    }

    /// Drop the write half without a close handshake (used when the
    /// connection is already considered dead).
    pub async fn clear_writer(&self) {
        self.writer.lock().await.take();
    }

    /// Send one text frame through the current transport.
    pub async fn send_text(&self, text: String) -> Result<()> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(sink) => sink.send(text).await,
            None => Err(RealtimeError::NotConnected),
        }
    }

    /// Close the transport gracefully and end in `Disconnected`.
    ///
    /// Close-handshake failures are logged, not surfaced: a disconnect is
    /// always honored.
    pub async fn close(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            if let Err(e) = sink.close().await {
                tracing::debug!("transport close error: {}", e);
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
