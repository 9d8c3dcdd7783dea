use thiserror::Error;

/// Errors that can occur when using the Broadcastt client.
///
/// Connection failures are never returned from the event loop; they are
/// recorded as [`ConnectionState`](crate::ConnectionState) and error codes.
/// These errors come back from API calls that can be refused up front.
#[derive(Error, Debug)]
pub enum BroadcasttError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authorization handshake error
    #[error("Authorization error: {0}")]
    Auth(String),

    /// Channel-specific error (wrong channel kind, unknown channel, etc.)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Event name belongs to a reserved protocol namespace
    #[error("Event '{0}' is reserved by the protocol")]
    ReservedEvent(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error (authorization endpoint)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error (malformed host or auth endpoint)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Attempted operation while no transport is open
    #[error("Not connected")]
    NotConnected,
}

/// Convenience type alias for `Result<T, BroadcasttError>`.
pub type Result<T> = std::result::Result<T, BroadcasttError>;
