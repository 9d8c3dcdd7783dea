use super::{Connector, Transport, TransportEvent, TransportSink};
use crate::types::constants::{WS_CLOSE_ABNORMAL, WS_CLOSE_NORMAL};
use crate::types::{BroadcasttError, Result};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;

/// Opens WebSocket transports with tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn Transport> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        tokio::spawn(run_connection(
            url.to_string(),
            outgoing_rx,
            Arc::clone(&open),
            sink,
            token.clone(),
        ));

        Box::new(WebSocketTransport {
            outgoing: outgoing_tx,
            open,
            token,
        })
    }
}

/// Write handle of a tokio-tungstenite connection. Dropping it tears the socket down.
pub struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Transport for WebSocketTransport {
    fn send(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(BroadcasttError::NotConnected);
        }

        self.outgoing
            .send(Message::Text(text.into()))
            .map_err(|_| BroadcasttError::NotConnected)
    }

    fn close(&self, code: u16, reason: &str) {
        if !self.open.swap(false, Ordering::SeqCst) {
            // Still connecting: abandon the handshake instead
            self.token.cancel();
            return;
        }

        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        if self.outgoing.send(Message::Close(Some(frame))).is_err() {
            self.token.cancel();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_connection(
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    open: Arc<AtomicBool>,
    sink: TransportSink,
    token: CancellationToken,
) {
    tracing::debug!("Opening WebSocket connection to {}", url);

    let connected = tokio::select! {
        _ = token.cancelled() => {
            sink(TransportEvent::Closed { code: WS_CLOSE_NORMAL, reason: String::new() });
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::error!("WebSocket connection to {} failed: {}", url, e);
            sink(TransportEvent::Error(e.to_string()));
            sink(TransportEvent::Closed {
                code: WS_CLOSE_ABNORMAL,
                reason: e.to_string(),
            });
            return;
        }
    };

    open.store(true, Ordering::SeqCst);
    sink(TransportEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    let (code, reason) = loop {
        // Queued frames go out before a cancel, so a close frame survives the drop
        tokio::select! {
            biased;

            Some(message) = outgoing.recv() => {
                let closing = match &message {
                    Message::Close(frame) => Some(
                        frame
                            .as_ref()
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((WS_CLOSE_NORMAL, String::new())),
                    ),
                    _ => None,
                };

                if let Err(e) = write.send(message).await {
                    tracing::error!("WebSocket write error: {}", e);
                    sink(TransportEvent::Error(e.to_string()));
                    break (WS_CLOSE_ABNORMAL, e.to_string());
                }
                if let Some(close) = closing {
                    break close;
                }
            }

            _ = token.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break (WS_CLOSE_NORMAL, String::new());
            }

            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!("Received text message: {}", text.as_str());
                        sink(TransportEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((WS_CLOSE_ABNORMAL, String::new()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::warn!("Received unexpected binary message ({} bytes)", data.len());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket read error: {}", e);
                        sink(TransportEvent::Error(e.to_string()));
                        break (WS_CLOSE_ABNORMAL, e.to_string());
                    }
                    None => break (WS_CLOSE_ABNORMAL, String::new()),
                }
            }
        }
    };

    open.store(false, Ordering::SeqCst);
    tracing::debug!("WebSocket connection closed: code={}, reason='{}'", code, reason);
    sink(TransportEvent::Closed { code, reason });
}
