// Module declarations
mod builder;
mod connection;
mod core;
mod state;

// Public API exports
pub use builder::{BroadcasttClientBuilder, BroadcasttOptions};
pub use connection::ConnectionManager;
pub use core::BroadcasttClient;
pub use state::{ClientState, ConnectionState};
