use crate::channel::Channel;
use crate::infrastructure::{HeartbeatManager, ScheduledTask};
use crate::websocket::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Connection lifecycle state, driven only by the connection manager.
///
/// `Reconnecting` is kept after the last allowed reconnect attempt failed;
/// [`ConnectionManager::is_reconnecting`](super::ConnectionManager::is_reconnecting)
/// tells whether another attempt is still coming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

/// Consolidated mutable state of the connection manager.
/// A single struct keeps every transition under one lock.
pub struct ClientState {
    pub status: ConnectionState,

    /// Server-assigned id of the current transport session
    pub socket_id: Option<String>,

    /// Last protocol error code received from the server
    pub error_code: Option<u16>,

    /// Reconnects made since the last successful open
    pub reconnects: u32,

    /// Bumped on every (re)open; events of older transports are dropped
    pub generation: u64,

    pub transport: Option<Box<dyn Transport>>,

    /// All channels joined on this client, unique by name
    pub channels: Vec<Arc<Channel>>,

    pub heartbeat: HeartbeatManager,

    pub reconnect_timer: Option<ScheduledTask>,

    /// Set by `disconnect()`; a closed transport is then not reopened
    pub closed_by_client: bool,

    /// Sender for state change notifications
    pub state_change_tx: watch::Sender<ConnectionState>,
}

impl ClientState {
    pub fn new(activity_timeout: Duration, pong_timeout: Duration) -> Self {
        let (state_change_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            status: ConnectionState::Connecting,
            socket_id: None,
            error_code: None,
            reconnects: 0,
            generation: 0,
            transport: None,
            channels: Vec::new(),
            heartbeat: HeartbeatManager::new(activity_timeout, pong_timeout),
            reconnect_timer: None,
            closed_by_client: false,
            state_change_tx,
        }
    }

    /// Set connection state and notify watchers
    pub fn set_status(&mut self, status: ConnectionState) {
        if self.status == status {
            return;
        }
        tracing::debug!("Connection state: {:?} -> {:?}", self.status, status);
        self.status = status;
        self.state_change_tx.send_replace(status);
    }

    pub fn find_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels
            .iter()
            .find(|channel| channel.name() == name)
            .cloned()
    }

    pub fn is_transport_open(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_open())
    }
}
