//! # Broadcastt Rust
//!
//! An unofficial Rust client for Broadcastt realtime channels: public,
//! private (authorized) and presence (authorized, with a member roster).
//!
//! ## Example
//!
//! ```no_run
//! use broadcastt_rs::{BroadcasttClient, ConnectionState, EventPayload};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BroadcasttClient::builder("your-app-key")
//!         .auth_endpoint("https://example.com/broadcasting/auth")
//!         .build()?;
//!
//!     client.connect();
//!     client.wait_for(ConnectionState::Connected).await?;
//!
//!     client.private("orders").bind(
//!         "order-shipped",
//!         Arc::new(|payload: &EventPayload| println!("{}", payload.data)),
//!     );
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use channel::{
    Callback, Channel, ChannelKind, ChannelStatus, EventPayload, MemberInfo, Members,
};
pub use client::{BroadcasttClient, BroadcasttClientBuilder, BroadcasttOptions, ConnectionState};
pub use infrastructure::{AuthRequest, Authorizer, HttpAuthorizer, xsrf_token_from_cookies};
pub use types::{BroadcasttError, Envelope, Result};
pub use websocket::{Connector, Transport, TransportEvent, TransportSink};
