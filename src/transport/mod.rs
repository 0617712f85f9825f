//! Transport abstraction: a persistent duplex connection carrying JSON text
//! frames. Production uses the WebSocket factory; tests inject in-memory
//! doubles through the same traits.

pub mod websocket;

pub use websocket::WebSocketFactory;

use crate::types::error::Result;
use async_trait::async_trait;

/// Write half of an open transport connection.
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, text: String) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Read half of an open transport connection.
///
/// `next` yields `None` when the peer closes the connection.
#[async_trait]
pub trait TransportStream: Send {
    async fn next(&mut self) -> Option<Result<String>>;
}

/// Opens transport connections. One factory serves the life of a client;
/// every reconnect attempt goes through it.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self, url: &str)
    -> Result<(Box<dyn TransportSink>, Box<dyn TransportStream>)>;
}
