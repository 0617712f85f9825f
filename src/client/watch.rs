use super::connection::{ConnectionState, ConnectionStatus};
use tokio::sync::watch;

/// Consumer-facing view of the connection lifecycle.
///
/// Wraps a watch receiver: reads are cheap snapshots, `changed()` suspends
/// until the next state or error transition. One handle per consumer;
/// handles are independent and never affect the connection.
pub struct ConnectionWatch {
    rx: watch::Receiver<ConnectionStatus>,
}

impl ConnectionWatch {
    pub(crate) fn new(rx: watch::Receiver<ConnectionStatus>) -> Self {
        Self { rx }
    }

    pub fn state(&self) -> ConnectionState {
        self.rx.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The most recent transport or authentication failure, cleared on the
    /// next successful open.
    pub fn last_error(&self) -> Option<String> {
        self.rx.borrow().last_error.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.rx.borrow().clone()
    }

    /// Wait for the next status change. Returns `false` once the client has
    /// been dropped and no further changes can arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
