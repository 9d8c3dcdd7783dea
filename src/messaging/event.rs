use crate::types::constants::{INTERNAL_PREFIX, PROTOCOL_PREFIX, protocol_events};

/// Connection-level control events intercepted before channel routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlEvent {
    ConnectionEstablished,
    Pong,
    Error,
}

impl ControlEvent {
    /// Parse an event name into a control event, if it is one
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            protocol_events::CONNECTION_ESTABLISHED => Some(Self::ConnectionEstablished),
            protocol_events::PONG => Some(Self::Pong),
            protocol_events::ERROR => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished => protocol_events::CONNECTION_ESTABLISHED,
            Self::Pong => protocol_events::PONG,
            Self::Error => protocol_events::ERROR,
        }
    }
}

impl std::fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Namespace an event name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventNamespace {
    /// `broadcastt:*`, public protocol events; applications may listen but never send
    Protocol,
    /// `broadcastt_internal:*`, reserved for the channel itself
    Internal,
    /// Application events
    Application,
}

impl EventNamespace {
    pub fn of(event: &str) -> Self {
        if event.starts_with(INTERNAL_PREFIX) {
            Self::Internal
        } else if event.starts_with(PROTOCOL_PREFIX) {
            Self::Protocol
        } else {
            Self::Application
        }
    }
}

/// Whether applications are forbidden from binding to or unbinding `event`
pub fn is_internal(event: &str) -> bool {
    EventNamespace::of(event) == EventNamespace::Internal
}
