use super::listeners::{InternalHandler, ListenerRegistry};
use super::presence::{MemberInfo, Members};
use crate::types::constants::{PRESENCE_CHANNEL_PREFIX, PRIVATE_CHANNEL_PREFIX, internal_events};

/// Channel subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    None,
    Pending,
    Subscribed,
    Unsubscribed,
}

/// How a channel subscribes, and which extras it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Sends `subscribe` right away
    Public,
    /// Authorizes against the auth endpoint before sending `subscribe`
    Private,
    /// Private, plus a member roster
    Presence,
}

impl ChannelKind {
    /// Picks the kind from the channel name prefix
    pub fn from_name(name: &str) -> Self {
        if name.starts_with(PRIVATE_CHANNEL_PREFIX) {
            Self::Private
        } else if name.starts_with(PRESENCE_CHANNEL_PREFIX) {
            Self::Presence
        } else {
            Self::Public
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Private | Self::Presence)
    }

    pub fn tracks_members(&self) -> bool {
        matches!(self, Self::Presence)
    }
}

/// Mutable state for a Channel
pub struct ChannelState {
    pub status: ChannelStatus,
    pub listeners: ListenerRegistry,
    /// Presence roster; `None` until the subscription succeeds
    pub members: Option<Members>,
    /// Own member entry from the last authorization response
    pub me: Option<MemberInfo>,
}

impl ChannelState {
    pub fn new(kind: ChannelKind) -> Self {
        let mut listeners = ListenerRegistry::new();
        listeners.install(
            internal_events::SUBSCRIPTION_SUCCEEDED,
            InternalHandler::SubscriptionSucceeded,
        );
        if kind.tracks_members() {
            listeners.install(internal_events::MEMBER_ADDED, InternalHandler::MemberAdded);
            listeners.install(
                internal_events::MEMBER_REMOVED,
                InternalHandler::MemberRemoved,
            );
        }

        Self {
            status: ChannelStatus::None,
            listeners,
            members: None,
            me: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(ChannelKind::from_name("orders"), ChannelKind::Public);
        assert_eq!(ChannelKind::from_name("private-orders"), ChannelKind::Private);
        assert_eq!(ChannelKind::from_name("presence-room"), ChannelKind::Presence);
        assert_eq!(ChannelKind::from_name("my-private-room"), ChannelKind::Public);
    }

    #[test]
    fn test_presence_state_installs_roster_listeners() {
        assert_eq!(ChannelState::new(ChannelKind::Public).listeners.len(), 1);
        assert_eq!(ChannelState::new(ChannelKind::Private).listeners.len(), 1);
        assert_eq!(ChannelState::new(ChannelKind::Presence).listeners.len(), 3);
    }
}
