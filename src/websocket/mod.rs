// WebSocket module - Transport seam and the tokio-tungstenite implementation
mod factory;

pub use factory::{WebSocketConnector, WebSocketTransport};

use crate::types::Result;
use std::sync::Arc;

/// Lifecycle events reported by a transport, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    /// Transport-level failure; a `Closed` event follows when the socket is gone
    Error(String),
    Closed { code: u16, reason: String },
}

/// Receives the events of one transport connection
pub type TransportSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// An open (or opening) socket connection
pub trait Transport: Send + Sync {
    /// Writes one text frame. Fails when the socket is not open.
    fn send(&self, text: String) -> Result<()>;

    /// Starts the close handshake with `code` and `reason`
    fn close(&self, code: u16, reason: &str);

    fn is_open(&self) -> bool;
}

/// Opens transports. Opening never blocks: progress is reported to the sink.
pub trait Connector: Send + Sync {
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn Transport>;
}
