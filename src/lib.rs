//! # Realtime Client
//!
//! A persistent bidirectional connection manager delivering server-pushed
//! notifications and upload-progress events, with single-flight token
//! coordination, bounded reconnection and typed event dispatch.
//!
//! ## Example
//!
//! ```no_run
//! use realtime_client::{
//!     EventKind, RealtimeClientBuilder, RealtimeClientOptions, StaticTokenProvider,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClientBuilder::new(
//!         "wss://api.example.com/realtime",
//!         RealtimeClientOptions {
//!             user_id: Some("user-42".to_string()),
//!             ..Default::default()
//!         },
//!         Arc::new(StaticTokenProvider::new("service-token")),
//!     )?
//!     .build();
//!
//!     client.connect().await?;
//!
//!     let _subscription = client.subscribe(EventKind::NotificationCreated, |event| {
//!         println!("notification: {:?}", event);
//!     });
//!
//!     let notifications = client.notifications();
//!     println!("unread: {}", notifications.unread_count());
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod stores;
pub mod transport;
pub mod types;

pub use auth::{StaticTokenProvider, Token, TokenCoordinator, TokenProvider};
pub use client::{
    ConnectionManager, ConnectionMetadata, ConnectionState, ConnectionStats, ConnectionStatus,
    ConnectionWatch, DisconnectPolicy, RealtimeClient, RealtimeClientBuilder,
    RealtimeClientOptions, SendOutcome,
};
pub use infrastructure::{
    MessageQueue, OverflowPolicy, RateLimitPolicy, RateLimitSnapshot, RateLimiter, ReconnectPolicy,
};
pub use messaging::{
    EventBus, EventHandler, EventKind, Notification, NotificationKind, ServerEvent, Subscription,
    UploadStatus,
};
pub use stores::{
    NoopNotificationBackend, NotificationBackend, NotificationStore, UploadProgressRecord,
    UploadProgressView, UploadStore,
};
pub use transport::{TransportFactory, TransportSink, TransportStream, WebSocketFactory};
pub use types::{ClientMessage, RealtimeError, Result};
