// Module declarations
mod builder;
mod connection;
mod core;
mod state;
mod stats;
mod watch;

// Public API exports
pub use builder::{DisconnectPolicy, RealtimeClientBuilder, RealtimeClientOptions};
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use core::{RealtimeClient, SendOutcome};
pub use state::ClientState;
pub use stats::{ConnectionMetadata, ConnectionStats};
pub use watch::ConnectionWatch;
