use std::time::Duration;

/// Prefix of the public protocol events (`broadcastt:*`)
pub const PROTOCOL_PREFIX: &str = "broadcastt:";

/// Prefix of the server-to-client internal channel events (`broadcastt_internal:*`)
pub const INTERNAL_PREFIX: &str = "broadcastt_internal:";

/// Protocol event strings (magic strings layer)
pub mod protocol_events {
    pub const SUBSCRIBE: &str = "broadcastt:subscribe";
    pub const UNSUBSCRIBE: &str = "broadcastt:unsubscribe";
    pub const PING: &str = "broadcastt:ping";
    pub const PONG: &str = "broadcastt:pong";
    pub const CONNECTION_ESTABLISHED: &str = "broadcastt:connection_established";
    pub const ERROR: &str = "broadcastt:error";
    pub const SUBSCRIPTION_SUCCEEDED: &str = "broadcastt:subscription_succeeded";
    pub const SUBSCRIPTION_ERROR: &str = "broadcastt:subscription_error";
    pub const MEMBER_ADDED: &str = "broadcastt:member_added";
    pub const MEMBER_REMOVED: &str = "broadcastt:member_removed";
}

/// Internal channel event strings, only ever sent by the server
pub mod internal_events {
    pub const SUBSCRIPTION_SUCCEEDED: &str = "broadcastt_internal:subscription_succeeded";
    pub const MEMBER_ADDED: &str = "broadcastt_internal:member_added";
    pub const MEMBER_REMOVED: &str = "broadcastt_internal:member_removed";
}

/// Channel name prefixes selecting the channel kind
pub const PRIVATE_CHANNEL_PREFIX: &str = "private-";
pub const PRESENCE_CHANNEL_PREFIX: &str = "presence-";

pub const DEFAULT_HOST: &str = "eu.broadcastt.xyz";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_INSECURE_PORT: u16 = 80;
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AUTH_ENDPOINT: &str = "/broadcasting/auth";
pub const DEFAULT_MAXIMUM_RECONNECTS: u32 = 8;

/// Protocol error codes that end the connection for good
pub const FATAL_ERROR_CODES: std::ops::RangeInclusive<u16> = 4000..=4099;

/// Protocol error codes asking for an immediate reconnect
pub const IMMEDIATE_RETRY_ERROR_CODES: std::ops::RangeInclusive<u16> = 4200..=4299;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
pub const WS_CLOSE_ABNORMAL: u16 = 1006;
