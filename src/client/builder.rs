use super::connection::{ConnectionManager, ConnectionState};
use super::core::RealtimeClient;
use super::state::ClientState;
use crate::auth::{TokenCoordinator, TokenProvider};
use crate::infrastructure::{
    MessageQueue, OverflowPolicy, RateLimitPolicy, RateLimiter, ReconnectPolicy,
};
use crate::messaging::EventBus;
use crate::stores::{NoopNotificationBackend, NotificationBackend, NotificationStore, UploadStore};
use crate::transport::{TransportFactory, WebSocketFactory};
use crate::types::constants::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_QUEUE_CAPACITY, DEFAULT_RATE_LIMIT_MESSAGES,
    DEFAULT_RATE_LIMIT_WINDOW, DEFAULT_RECONNECT_BASE_DELAY, DEFAULT_RECONNECT_FACTOR,
    DEFAULT_RECONNECT_MAX_DELAY,
};
use crate::types::Result;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

/// What `disconnect()` does with messages still queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectPolicy {
    /// Drop the queue.
    #[default]
    DiscardQueue,
    /// Best-effort transmit of queued messages that the rate window still
    /// admits, then drop the rest.
    FlushQueue,
}

/// Configuration for a realtime client. Unset fields fall back to the
/// crate defaults.
#[derive(Debug, Clone, Default)]
pub struct RealtimeClientOptions {
    /// Identity recorded in connection metadata and the handshake URL
    pub user_id: Option<String>,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: Option<u64>,
    /// Consecutive failed opens tolerated before surfacing `Error`
    pub max_reconnect_attempts: Option<u32>,
    /// Base reconnect delay in milliseconds
    pub reconnect_base_delay: Option<u64>,
    /// Reconnect delay cap in milliseconds
    pub reconnect_max_delay: Option<u64>,
    /// Outbound messages admitted per rate window
    pub rate_limit_messages: Option<u32>,
    /// Rate window length in milliseconds
    pub rate_limit_window: Option<u64>,
    /// Outbound queue capacity
    pub queue_capacity: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub rate_limit_policy: RateLimitPolicy,
    pub disconnect_policy: DisconnectPolicy,
}

/// Builder wiring a [`RealtimeClient`] instance together.
///
/// The client is an explicitly constructed, dependency-injected instance:
/// the transport factory, token provider and notification backend all come
/// in through here, so tests run against in-memory doubles and applications
/// can hold several isolated clients.
pub struct RealtimeClientBuilder {
    endpoint: String,
    options: RealtimeClientOptions,
    factory: Arc<dyn TransportFactory>,
    tokens: Arc<dyn TokenProvider>,
    backend: Arc<dyn NotificationBackend>,
}

impl RealtimeClientBuilder {
    /// Create a new builder.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::UrlParse`](crate::types::RealtimeError::UrlParse)
    /// if the endpoint is not a valid URL.
    pub fn new(
        endpoint: impl Into<String>,
        options: RealtimeClientOptions,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;

        Ok(Self {
            endpoint,
            options,
            factory: Arc::new(WebSocketFactory),
            tokens,
            backend: Arc::new(NoopNotificationBackend),
        })
    }

    /// Replace the WebSocket transport with another factory.
    pub fn transport(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Receive read/remove acknowledgements from the notification store.
    pub fn notification_backend(mut self, backend: Arc<dyn NotificationBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Build the client, wire the stores to the bus and spawn the
    /// reconnection watcher. Must be called within a Tokio runtime.
    pub fn build(self) -> RealtimeClient {
        let bus = Arc::new(EventBus::new());
        let notifications = Arc::new(NotificationStore::new(self.backend));
        let uploads = Arc::new(UploadStore::new());
        NotificationStore::attach(&notifications, &bus);
        UploadStore::attach(&uploads, &bus);

        let rate_limiter = RateLimiter::new(
            self.options
                .rate_limit_messages
                .unwrap_or(DEFAULT_RATE_LIMIT_MESSAGES),
            Duration::from_millis(
                self.options
                    .rate_limit_window
                    .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW),
            ),
        );
        let queue = MessageQueue::new(
            self.options.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            self.options.overflow_policy,
        );
        let policy = ReconnectPolicy::new(
            Duration::from_millis(
                self.options
                    .reconnect_base_delay
                    .unwrap_or(DEFAULT_RECONNECT_BASE_DELAY),
            ),
            DEFAULT_RECONNECT_FACTOR,
            Duration::from_millis(
                self.options
                    .reconnect_max_delay
                    .unwrap_or(DEFAULT_RECONNECT_MAX_DELAY),
            ),
            self.options
                .max_reconnect_attempts
                .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS),
        );

        let connection = Arc::new(ConnectionManager::new());
        let status_rx = connection.subscribe();

        let client = RealtimeClient {
            endpoint: self.endpoint,
            options: self.options,
            factory: self.factory,
            tokens: TokenCoordinator::new(self.tokens),
            bus,
            notifications,
            uploads,
            connection,
            policy,
            state: Arc::new(RwLock::new(ClientState::new(rate_limiter, queue))),
            connect_flight: Arc::new(Mutex::new(None)),
            reconnect_cancel: Arc::new(Notify::new()),
            queue_signal: Arc::new(Notify::new()),
            watcher: Arc::new(Mutex::new(None)),
        };

        // Reconnection watcher: reacts to every Reconnecting transition,
        // whether it came from a failed open, a dropped transport or a
        // missed heartbeat.
        let watcher_client = client.clone();
        let watcher_task = tokio::spawn(async move {
            let mut rx = status_rx;

            while rx.changed().await.is_ok() {
                let status = rx.borrow_and_update().clone();
                if status.state != ConnectionState::Reconnecting {
                    continue;
                }
                if watcher_client.state.read().was_manual_disconnect {
                    continue;
                }
                watcher_client.run_reconnect_loop().await;
            }
            tracing::debug!("reconnection watcher finished");
        });
        *client.watcher.lock() = Some(watcher_task);

        client
    }
}
