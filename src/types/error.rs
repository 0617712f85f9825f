use thiserror::Error;

/// Errors that can occur when using the realtime client.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authentication or authorization error (never schedule-retried)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Outbound message rejected because the rate window is saturated
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Outbound queue is at capacity and the overflow policy rejects new entries
    #[error("Message queue full")]
    QueueFull,

    /// Reconnect attempts exhausted; an explicit connect is required to resume
    #[error("Reconnect attempts exhausted")]
    AttemptsExhausted,

    /// Malformed outbound message (developer misuse, e.g. empty event name)
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
