use super::ControlEvent;
use crate::types::{Envelope, Result};
use serde_json::Value;

/// Where an inbound frame has to go
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Connection-level control event, handled by the connection manager
    Control { event: ControlEvent, data: Value },
    /// Event for the channel with this exact name
    Channel {
        channel: String,
        event: String,
        data: Value,
    },
    /// Not a control event and no channel named; dropped
    Unroutable { event: String },
}

/// Decodes inbound frames and decides how they are routed
pub struct MessageRouter;

impl MessageRouter {
    /// Parses a text frame into an envelope
    pub fn decode(text: &str) -> Result<Envelope> {
        Ok(serde_json::from_str(text)?)
    }

    /// Classifies an envelope. Control events win over channel routing.
    pub fn route(envelope: Envelope) -> Route {
        let data = envelope.decoded_data();

        if let Some(event) = ControlEvent::parse(&envelope.event) {
            return Route::Control { event, data };
        }

        match envelope.channel {
            Some(channel) => Route::Channel {
                channel,
                event: envelope.event,
                data,
            },
            None => Route::Unroutable {
                event: envelope.event,
            },
        }
    }
}
