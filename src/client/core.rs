use super::builder::{DisconnectPolicy, RealtimeClientOptions};
use super::connection::{ConnectionManager, ConnectionState};
use super::state::ClientState;
use super::stats::{ConnectionMetadata, ConnectionStats};
use super::watch::ConnectionWatch;
use crate::auth::TokenCoordinator;
use crate::infrastructure::{HeartbeatManager, RateLimitPolicy, ReconnectPolicy};
use crate::messaging::{
    EventBus, EventHandler, EventKind, MessageRouter, ServerEvent, Subscription,
};
use crate::stores::{NotificationStore, UploadStore};
use crate::transport::{TransportFactory, TransportStream};
use crate::types::constants::DEFAULT_HEARTBEAT_INTERVAL;
use crate::types::{ClientMessage, RealtimeError, Result};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use url::Url;

/// Outcome of a `send()` call that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Transmitted on the live connection.
    Sent,
    /// Accepted into the outbound queue, to be transmitted when a
    /// connection and a free rate-window slot exist.
    Queued,
}

/// Clonable failure carried through the shared connect future so every
/// overlapping `connect()` caller observes the same outcome.
#[derive(Debug, Clone)]
pub(crate) enum ConnectFailure {
    Auth(String),
    Transport(String),
}

impl From<ConnectFailure> for RealtimeError {
    fn from(failure: ConnectFailure) -> Self {
        match failure {
            ConnectFailure::Auth(message) => RealtimeError::Auth(message),
            ConnectFailure::Transport(message) => RealtimeError::Connection(message),
        }
    }
}

type ConnectFlight = Shared<BoxFuture<'static, std::result::Result<(), ConnectFailure>>>;

/// The realtime client: a state machine owning the transport lifecycle.
///
/// `connect()` fetches a token, opens the transport, drains the outbound
/// queue and starts the read/heartbeat tasks. Dropped connections reconnect
/// with capped, jittered backoff until the attempt ceiling is reached;
/// authentication failures and exhausted retries surface as the terminal
/// `Error` state that only an explicit `connect()` leaves.
///
/// # Example
///
/// ```no_run
/// use realtime_client::{RealtimeClientBuilder, RealtimeClientOptions, StaticTokenProvider};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClientBuilder::new(
///     "wss://api.example.com/realtime",
///     RealtimeClientOptions::default(),
///     Arc::new(StaticTokenProvider::new("service-token")),
/// )?
/// .build();
///
/// client.connect().await?;
/// // Use the client...
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) endpoint: String,
    pub(crate) options: RealtimeClientOptions,
    pub(crate) factory: Arc<dyn TransportFactory>,
    pub(crate) tokens: TokenCoordinator,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) notifications: Arc<NotificationStore>,
    pub(crate) uploads: Arc<UploadStore>,
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) policy: ReconnectPolicy,

    // Consolidated mutable state
    pub(crate) state: Arc<RwLock<ClientState>>,

    // In-flight connect attempt shared by overlapping callers
    pub(crate) connect_flight: Arc<Mutex<Option<ConnectFlight>>>,
    // Cancels the watcher's backoff sleep
    pub(crate) reconnect_cancel: Arc<Notify>,
    // Wakes the queue flusher after an enqueue
    pub(crate) queue_signal: Arc<Notify>,
    pub(crate) watcher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RealtimeClient {
    /// Establishes a connection to the server.
    ///
    /// Idempotent: while an attempt is already in flight, every overlapping
    /// caller awaits that same attempt and observes its outcome; exactly one
    /// transport open occurs. An explicit call resets the reconnect counter
    /// and the manual-disconnect flag, so it also restarts a client stuck in
    /// the terminal `Error` state.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Auth`] when the token fetch fails (never
    /// schedule-retried) and [`RealtimeError::Connection`] when the open
    /// fails (retried in the background while attempts remain).
    pub async fn connect(&self) -> Result<()> {
        let flight = {
            let mut guard = self.connect_flight.lock();
            match guard.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    match self.connection.state() {
                        ConnectionState::Connected | ConnectionState::Connecting => {
                            return Ok(());
                        }
                        _ => {}
                    }
                    let client = self.clone();
                    let flight: ConnectFlight =
                        async move { client.run_connect().await }.boxed().shared();
                    *guard = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await.map_err(RealtimeError::from)
    }

    async fn run_connect(&self) -> std::result::Result<(), ConnectFailure> {
        {
            let mut state = self.state.write();
            state.was_manual_disconnect = false;
            state.reconnect_attempts = 0;
        }
        // This attempt takes over from any backoff sleep the watcher owns
        self.reconnect_cancel.notify_waiters();
        self.connection.set_state(ConnectionState::Connecting);

        let result = self.attempt_open(false).await;
        self.connect_flight.lock().take();

        // The watcher skips Reconnecting transitions while this flight is
        // registered; re-publish after clearing it so a failure observed in
        // that window still gets its retry schedule.
        if result.is_err() && self.connection.state() == ConnectionState::Reconnecting {
            self.connection.set_state(ConnectionState::Reconnecting);
        }
        result
    }

    /// One full open attempt: token, transport, task startup.
    async fn attempt_open(&self, is_reconnect: bool) -> std::result::Result<(), ConnectFailure> {
        self.teardown_connection().await;

        let token = match self.tokens.get_valid_token().await {
            Ok(token) => token,
            Err(e) => {
                let message = e.to_string();
                tracing::error!("token fetch failed, not retrying: {}", message);
                self.connection
                    .set_failure(ConnectionState::Error, message.clone());
                return Err(ConnectFailure::Auth(message));
            }
        };

        let url = match self.build_endpoint_url(&token) {
            Ok(url) => url,
            Err(e) => return Err(self.register_open_failure(e.to_string())),
        };

        tracing::info!("Connecting to {}", self.endpoint);
        let (sink, stream) = match self.factory.connect(&url).await {
            Ok(halves) => halves,
            Err(e) => return Err(self.register_open_failure(e.to_string())),
        };

        // A disconnect issued while the open was in flight wins
        if self.state.read().was_manual_disconnect {
            tracing::info!("disconnected during connect, dropping fresh transport");
            self.connection.set_state(ConnectionState::Disconnected);
            return Err(ConnectFailure::Transport(
                "disconnected during connect".to_string(),
            ));
        }

        self.connection.set_writer(sink).await;
        {
            let mut state = self.state.write();
            state.reconnect_attempts = 0;
            if is_reconnect {
                state.total_reconnects += 1;
            }
            let total_reconnects = state.total_reconnects;
            state.metadata = Some(ConnectionMetadata::new(
                self.options.user_id.clone(),
                total_reconnects,
            ));
            state.pending_heartbeat_ref = None;
        }

        // Publish Connected before spawning the tasks: the flusher exits
        // whenever it observes any other state.
        self.connection.set_state(ConnectionState::Connected);

        self.spawn_read_task(stream);
        self.spawn_heartbeat_task();
        self.spawn_queue_flusher();
        self.queue_signal.notify_one();
        tracing::info!("Connected");
        Ok(())
    }

    /// Record a failed open: bump the attempt counter, surface either
    /// `Reconnecting` (attempts remain) or the terminal `Error`.
    fn register_open_failure(&self, message: String) -> ConnectFailure {
        let attempts = {
            let mut state = self.state.write();
            state.reconnect_attempts += 1;
            state.reconnect_attempts
        };

        if attempts >= self.policy.max_attempts() {
            tracing::error!(
                "connection attempt {} failed, retries exhausted: {}",
                attempts,
                message
            );
            self.connection
                .set_failure(ConnectionState::Error, message.clone());
        } else {
            tracing::warn!("connection attempt {} failed: {}", attempts, message);
            self.connection
                .set_failure(ConnectionState::Reconnecting, message.clone());
        }
        ConnectFailure::Transport(message)
    }

    /// Abort the previous connection's tasks and drop its writer.
    async fn teardown_connection(&self) {
        {
            let mut state = self.state.write();
            state.task_manager.abort_all();
            state.pending_heartbeat_ref = None;
        }
        self.connection.clear_writer().await;
    }

    /// Bounded reconnect loop, driven by the watcher task after every
    /// `Reconnecting` transition. Never runs concurrently with itself: the
    /// watcher is a single task and runs it inline.
    pub(crate) async fn run_reconnect_loop(&self) {
        loop {
            if self.connection.state() != ConnectionState::Reconnecting {
                break;
            }
            let (attempts, manual) = {
                let state = self.state.read();
                (state.reconnect_attempts, state.was_manual_disconnect)
            };
            if manual {
                break;
            }
            // An explicit connect() owns recovery from here on
            if self.connect_flight.lock().is_some() {
                break;
            }
            if attempts >= self.policy.max_attempts() {
                tracing::error!("giving up after {} reconnect attempts", attempts);
                self.connection.set_failure(
                    ConnectionState::Error,
                    RealtimeError::AttemptsExhausted.to_string(),
                );
                break;
            }

            let delay = self.policy.delay_for(attempts);
            tracing::info!(
                "reconnecting in {:?} (attempt {}/{})",
                delay,
                attempts + 1,
                self.policy.max_attempts()
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.reconnect_cancel.notified() => {
                    tracing::debug!("reconnect wait cancelled");
                    break;
                }
            }

            if self.state.read().was_manual_disconnect {
                break;
            }
            if self.connect_flight.lock().is_some() {
                break;
            }

            self.connection.set_state(ConnectionState::Connecting);
            match self.attempt_open(true).await {
                Ok(()) => {
                    tracing::info!("Reconnected");
                    break;
                }
                // attempt_open already surfaced the terminal Error state
                Err(ConnectFailure::Auth(_)) => break,
                Err(ConnectFailure::Transport(_)) => continue,
            }
        }
    }

    fn spawn_read_task(&self, mut stream: Box<dyn TransportStream>) {
        let client = self.clone();
        let router = MessageRouter::new(Arc::clone(&self.state), Arc::clone(&self.bus));

        let mut state = self.state.write();
        state.task_manager.spawn(async move {
            tracing::debug!("read task started");
            loop {
                match stream.next().await {
                    Some(Ok(text)) => {
                        tracing::debug!("received frame: {}", text);
                        router.route(&text);
                    }
                    Some(Err(e)) => {
                        tracing::error!("transport read error: {}", e);
                        client.handle_transport_drop(e.to_string()).await;
                        break;
                    }
                    None => {
                        tracing::info!("transport closed by server");
                        client
                            .handle_transport_drop("connection closed".to_string())
                            .await;
                        break;
                    }
                }
            }
            tracing::debug!("read task finished");
        });
    }

    fn spawn_heartbeat_task(&self) {
        let interval = Duration::from_millis(
            self.options
                .heartbeat_interval
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL),
        );
        let heartbeat = HeartbeatManager::new(
            Arc::downgrade(&self.connection),
            Arc::clone(&self.state),
        )
        .with_interval(interval);

        let mut state = self.state.write();
        state.task_manager.spawn(heartbeat.run());
    }

    fn spawn_queue_flusher(&self) {
        let client = self.clone();
        let mut state = self.state.write();
        state.task_manager.spawn(client.run_queue_flusher());
    }

    /// Drains the outbound queue in FIFO order, re-admitting every message
    /// through the rate limiter. Messages the current window refuses stay
    /// queued until the window resets.
    async fn run_queue_flusher(self) {
        enum Step {
            Transmit(String),
            WaitWindow(Duration),
            Idle,
            Skip,
        }

        loop {
            if self.connection.state() != ConnectionState::Connected {
                break;
            }

            let step = {
                let mut state = self.state.write();
                match state.queue.peek().map(|q| q.message.clone()) {
                    None => Step::Idle,
                    Some(message) => match serde_json::to_string(&message) {
                        Ok(json) => {
                            if state.rate_limiter.try_admit() {
                                Step::Transmit(json)
                            } else {
                                Step::WaitWindow(state.rate_limiter.time_until_reset())
                            }
                        }
                        Err(e) => {
                            tracing::error!("dropping unencodable queued message: {}", e);
                            state.queue.pop();
                            Step::Skip
                        }
                    },
                }
            };

            match step {
                Step::Transmit(json) => match self.connection.send_text(json).await {
                    Ok(()) => {
                        let mut state = self.state.write();
                        state.queue.pop();
                        if let Some(metadata) = state.metadata.as_mut() {
                            metadata.total_messages_sent += 1;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("queue flush write failed: {}", e);
                        self.handle_transport_drop(e.to_string()).await;
                        break;
                    }
                },
                Step::WaitWindow(wait) => {
                    tracing::debug!("rate window saturated, resuming flush in {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
                Step::Idle => self.queue_signal.notified().await,
                Step::Skip => {}
            }
        }
        tracing::debug!("queue flusher finished");
    }

    /// Drop into `Reconnecting` after the transport died underneath us.
    async fn handle_transport_drop(&self, reason: String) {
        if self.state.read().was_manual_disconnect {
            return;
        }
        self.connection.clear_writer().await;
        self.connection
            .set_failure(ConnectionState::Reconnecting, reason);
    }

    /// Sends a message, or queues it when no connection or rate capacity
    /// exists.
    ///
    /// Not connected: the message is queued (within the overflow policy) and
    /// transmitted in FIFO order after the next successful open. Connected
    /// but rate-limited: queued or rejected per the configured policy.
    /// Transient transport failures are not surfaced here; the message is
    /// queued and a reconnect begins.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::InvalidMessage`] for an empty event name,
    /// [`RealtimeError::RateLimited`] / [`RealtimeError::QueueFull`] per the
    /// configured policies.
    pub async fn send(&self, message: ClientMessage) -> Result<SendOutcome> {
        if message.event.is_empty() {
            return Err(RealtimeError::InvalidMessage(
                "event name is empty".to_string(),
            ));
        }

        if self.connection.state() != ConnectionState::Connected {
            return self.enqueue(message);
        }

        enum Plan {
            Transmit(String),
            Queue,
            Limited,
        }

        let plan = {
            let mut state = self.state.write();
            if !state.queue.is_empty() {
                // A backlog is draining; joining it preserves send order
                Plan::Queue
            } else if state.rate_limiter.try_admit() {
                Plan::Transmit(serde_json::to_string(&message)?)
            } else {
                Plan::Limited
            }
        };

        match plan {
            Plan::Transmit(json) => match self.connection.send_text(json).await {
                Ok(()) => {
                    let mut state = self.state.write();
                    if let Some(metadata) = state.metadata.as_mut() {
                        metadata.total_messages_sent += 1;
                    }
                    Ok(SendOutcome::Sent)
                }
                Err(e) => {
                    tracing::warn!("send failed, queueing message and reconnecting: {}", e);
                    self.handle_transport_drop(e.to_string()).await;
                    self.enqueue(message)
                }
            },
            Plan::Queue => self.enqueue(message),
            Plan::Limited => match self.options.rate_limit_policy {
                RateLimitPolicy::QueueWhenLimited => self.enqueue(message),
                RateLimitPolicy::RejectWhenLimited => Err(RealtimeError::RateLimited),
            },
        }
    }

    fn enqueue(&self, message: ClientMessage) -> Result<SendOutcome> {
        self.state.write().queue.push(message)?;
        self.queue_signal.notify_one();
        Ok(SendOutcome::Queued)
    }

    /// Disconnects and stays disconnected until the next explicit
    /// `connect()`.
    ///
    /// Always honored immediately regardless of current state: cancels any
    /// pending reconnect, aborts the connection's tasks, then flushes or
    /// discards the queue per the configured policy.
    pub async fn disconnect(&self) -> Result<()> {
        self.state.write().was_manual_disconnect = true;
        self.reconnect_cancel.notify_waiters();

        if self.connection.state() == ConnectionState::Disconnected {
            return Ok(());
        }

        tracing::info!("Disconnecting");

        if self.options.disconnect_policy == DisconnectPolicy::FlushQueue {
            self.flush_queue_on_disconnect().await;
        }

        {
            let mut state = self.state.write();
            state.task_manager.abort_all();
            state.pending_heartbeat_ref = None;
            state.metadata = None;
            state.reconnect_attempts = 0;
            let dropped = state.queue.clear();
            if dropped > 0 {
                tracing::warn!("discarded {} queued messages on disconnect", dropped);
            }
        }

        self.connection.close().await;
        tracing::info!("Disconnected");
        Ok(())
    }

    /// Best-effort transmission of queued messages before the transport
    /// closes. Messages the rate window refuses cannot wait here and are
    /// dropped with the rest of the queue.
    async fn flush_queue_on_disconnect(&self) {
        if self.connection.state() != ConnectionState::Connected {
            return;
        }

        loop {
            let next = {
                let mut state = self.state.write();
                if state.queue.is_empty() || !state.rate_limiter.try_admit() {
                    None
                } else {
                    state.queue.pop()
                }
            };
            let Some(queued) = next else { break };

            let json = match serde_json::to_string(&queued.message) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("dropping unencodable queued message: {}", e);
                    continue;
                }
            };
            if let Err(e) = self.connection.send_text(json).await {
                tracing::warn!("flush on disconnect failed: {}", e);
                break;
            }
            let mut state = self.state.write();
            if let Some(metadata) = state.metadata.as_mut() {
                metadata.total_messages_sent += 1;
            }
        }
    }

    /// Register a handler for one event kind; the returned subscription's
    /// `unsubscribe()` removes it again. Registration order is dispatch
    /// order. Subscribing while disconnected is fine.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, Arc::new(handler))
    }

    /// Low-level handler registration keyed by handler identity.
    pub fn on(&self, kind: EventKind, handler: EventHandler) -> bool {
        self.bus.on(kind, handler)
    }

    /// Low-level handler removal by identity.
    pub fn off(&self, kind: EventKind, handler: &EventHandler) -> bool {
        self.bus.off(kind, handler)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Watch handle over connection state and the last error.
    pub fn connection_watch(&self) -> ConnectionWatch {
        ConnectionWatch::new(self.connection.subscribe())
    }

    /// The notification read model.
    pub fn notifications(&self) -> Arc<NotificationStore> {
        Arc::clone(&self.notifications)
    }

    /// The upload-progress read model.
    pub fn uploads(&self) -> Arc<UploadStore> {
        Arc::clone(&self.uploads)
    }

    /// Pure snapshot of connection state, counters and rate limiting.
    pub fn stats(&self) -> ConnectionStats {
        let state = self.state.read();
        ConnectionStats {
            state: self.connection.state(),
            reconnect_attempts: state.reconnect_attempts,
            queued_messages: state.queue.len(),
            active_listeners: self.bus.handler_count(),
            subscriptions: self.bus.subscription_count(),
            metadata: state.metadata.clone(),
            rate_limiting: state.rate_limiter.snapshot(),
        }
    }

    /// Metadata of the live connection, `None` while closed.
    pub fn metadata(&self) -> Option<ConnectionMetadata> {
        self.state.read().metadata.clone()
    }

    /// Disconnects and stops the reconnection watcher. After this the
    /// instance is inert; build a new client to reconnect.
    pub async fn shutdown(&self) {
        let _ = self.disconnect().await;
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.abort();
        }
    }

    fn build_endpoint_url(&self, token: &str) -> Result<String> {
        let mut url = Url::parse(&self.endpoint)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("token", token);
            if let Some(user_id) = &self.options.user_id {
                pairs.append_pair("user_id", user_id);
            }
        }
        Ok(url.to_string())
    }
}
