use super::{BroadcasttClientBuilder, BroadcasttOptions, ConnectionManager, ConnectionState};
use crate::channel::Channel;
use crate::types::constants::{PRESENCE_CHANNEL_PREFIX, PRIVATE_CHANNEL_PREFIX};
use crate::types::{BroadcasttError, Result};
use std::sync::Arc;
use tokio::sync::watch;

/// The main entry point for talking to a Broadcastt server.
///
/// `BroadcasttClient` holds one logical connection, reconnects it with a
/// linear backoff, and hands out channels. Cloning is cheap; every clone
/// drives the same connection.
///
/// # Example
///
/// ```no_run
/// use broadcastt_rs::{BroadcasttClient, ConnectionState, EventPayload};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = BroadcasttClient::builder("your-app-key").build()?;
/// client.connect();
///
/// let channel = client.join("orders");
/// channel.bind("order-shipped", Arc::new(|payload: &EventPayload| {
///     println!("shipped: {}", payload.data);
/// }));
///
/// client.wait_for(ConnectionState::Connected).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BroadcasttClient {
    pub(crate) options: Arc<BroadcasttOptions>,
    pub(crate) connection: Arc<ConnectionManager>,
}

impl BroadcasttClient {
    /// Creates a client with default options.
    ///
    /// Must be called from within a tokio runtime. Nothing connects until
    /// [`connect()`](Self::connect) is called.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcasttError::Config`] if `app_key` is empty.
    pub fn new(app_key: impl Into<String>) -> Result<Self> {
        BroadcasttClientBuilder::new(app_key).build()
    }

    pub fn builder(app_key: impl Into<String>) -> BroadcasttClientBuilder {
        BroadcasttClientBuilder::new(app_key)
    }

    /// Opens the connection. Returns immediately; watch
    /// [`state()`](Self::state) or use [`wait_for()`](Self::wait_for) to
    /// follow progress. Does nothing while a transport is open or opening.
    pub fn connect(&self) {
        self.connection.start();
    }

    /// Closes the connection for good and returns the state to
    /// [`ConnectionState::Connecting`]. Call [`connect()`](Self::connect) to
    /// open a new one.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Receiver notified on every connection state change
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state_receiver()
    }

    /// Waits until the connection reaches `target`
    pub async fn wait_for(&self, target: ConnectionState) -> Result<()> {
        let mut states = self.state_receiver();
        states
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| BroadcasttError::Connection("client was dropped".to_string()))
    }

    /// Server-assigned id of the current connection
    pub fn socket_id(&self) -> Option<String> {
        self.connection.socket_id()
    }

    /// Last protocol error code received from the server
    pub fn error_code(&self) -> Option<u16> {
        self.connection.error_code()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Whether another reconnect attempt is still coming
    pub fn is_reconnecting(&self) -> bool {
        self.connection.is_reconnecting()
    }

    /// Returns the channel named `name`, creating it on first use.
    ///
    /// The kind follows the name: `private-*` channels authorize before
    /// subscribing, `presence-*` channels also track members, anything else
    /// is public. Joining the same name twice returns the same channel.
    pub fn join(&self, name: &str) -> Arc<Channel> {
        self.connection.join(name)
    }

    /// Joins `private-{name}`
    pub fn private(&self, name: &str) -> Arc<Channel> {
        self.join(&format!("{}{}", PRIVATE_CHANNEL_PREFIX, name))
    }

    /// Joins `presence-{name}`
    pub fn presence(&self, name: &str) -> Arc<Channel> {
        self.join(&format!("{}{}", PRESENCE_CHANNEL_PREFIX, name))
    }

    /// A joined channel, or `None` if `name` was never joined
    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.connection.get(name)
    }

    /// Unsubscribes the channel named `name`. Unknown names are ignored.
    pub fn leave(&self, name: &str) {
        self.connection.leave(name);
    }

    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.connection.channels()
    }

    pub fn options(&self) -> &BroadcasttOptions {
        &self.options
    }
}
