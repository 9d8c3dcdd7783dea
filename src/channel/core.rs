use super::{
    listeners::{Callback, EventPayload, InternalHandler, Listener},
    presence::{MemberInfo, Members},
    state::{ChannelKind, ChannelState, ChannelStatus},
};
use crate::client::ConnectionManager;
use crate::messaging::EventNamespace;
use crate::types::constants::protocol_events;
use crate::types::{BroadcasttError, Envelope, Result};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A named topic on the connection.
///
/// The kind decides how it subscribes: public channels send `subscribe`
/// right away, private and presence channels authorize first, and presence
/// channels also keep a member roster.
///
/// # Example
///
/// ```no_run
/// use broadcastt_rs::{BroadcasttClient, EventPayload};
/// use std::sync::Arc;
///
/// # fn example(client: BroadcasttClient) {
/// let room = client.presence("lobby");
/// room.here(Arc::new(|payload: &EventPayload| {
///     println!("online: {:?}", payload.members);
/// }))
/// .joining(Arc::new(|payload: &EventPayload| {
///     println!("joined: {}", payload.data);
/// }));
/// # }
/// ```
pub struct Channel {
    name: String,
    kind: ChannelKind,
    connection: Weak<ConnectionManager>,
    state: Mutex<ChannelState>,
}

impl Channel {
    pub(crate) fn new(name: &str, connection: Weak<ConnectionManager>) -> Self {
        let kind = ChannelKind::from_name(name);
        Self {
            name: name.to_string(),
            kind,
            connection,
            state: Mutex::new(ChannelState::new(kind)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn status(&self) -> ChannelStatus {
        self.lock().status
    }

    /// Snapshot of the presence roster, once the subscription succeeded
    pub fn members(&self) -> Option<Members> {
        self.lock().members.clone()
    }

    /// This connection's own presence member, from the authorization response
    pub fn me(&self) -> Option<MemberInfo> {
        self.lock().me.clone()
    }

    /// Number of application callbacks bound to `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().listeners.count(event)
    }

    /// Subscribes to the channel.
    ///
    /// Does nothing while a subscription is pending or active, unless the
    /// connection is reconnecting: the new transport knows nothing about
    /// earlier subscriptions, so the handshake is repeated.
    pub fn subscribe(self: &Arc<Self>) -> &Self {
        let connection = self.connection.upgrade();
        let force = connection
            .as_ref()
            .is_some_and(|connection| connection.is_reconnecting());

        self.subscribe_with(connection.as_deref(), force);
        self
    }

    /// Repeats the handshake on a fresh transport. Unsubscribed channels stay so.
    pub(crate) fn resubscribe(self: &Arc<Self>) {
        if self.status() == ChannelStatus::Unsubscribed {
            return;
        }
        let connection = self.connection.upgrade();
        self.subscribe_with(connection.as_deref(), true);
    }

    fn subscribe_with(self: &Arc<Self>, connection: Option<&ConnectionManager>, force: bool) {
        {
            let mut state = self.lock();
            let active = matches!(
                state.status,
                ChannelStatus::Pending | ChannelStatus::Subscribed
            );
            if active && !force {
                return;
            }
            if state.status != ChannelStatus::Subscribed {
                state.status = ChannelStatus::Pending;
            }
        }

        let Some(connection) = connection else {
            tracing::debug!("Channel '{}' has no connection, not subscribing", self.name);
            return;
        };

        connection.register(self);

        if self.kind.requires_auth() {
            connection.request_authorization(&self.name);
        } else {
            self.send_frame(
                connection,
                protocol_events::SUBSCRIBE,
                json!({ "channel": self.name }),
            );
        }
    }

    /// Leaves the channel. A no-op unless a subscription was started.
    ///
    /// The presence roster is discarded; subscribing again starts clean.
    pub fn unsubscribe(&self) -> &Self {
        {
            let mut state = self.lock();
            if matches!(
                state.status,
                ChannelStatus::None | ChannelStatus::Unsubscribed
            ) {
                return self;
            }
            state.status = ChannelStatus::Unsubscribed;
            state.members = None;
            state.me = None;
        }

        if let Some(connection) = self.connection.upgrade() {
            self.send_frame(
                &connection,
                protocol_events::UNSUBSCRIBE,
                json!({ "channel": self.name }),
            );
        }
        self
    }

    /// Binds `callback` to `event`. Internal event names are refused.
    pub fn bind(&self, event: &str, callback: Callback) -> &Self {
        self.lock().listeners.bind(event, callback);
        self
    }

    /// Removes application callbacks; see [`ListenerRegistry::unbind`](super::ListenerRegistry::unbind)
    pub fn unbind(&self, event: Option<&str>, callback: Option<&Callback>) -> &Self {
        self.lock().listeners.unbind(event, callback);
        self
    }

    /// Calls the first listener bound to `event`, if any
    pub fn emit(&self, event: &str, data: Value) -> &Self {
        self.dispatch(EventPayload::new(event, data));
        self
    }

    /// Sends a client event on a private or presence channel
    pub fn send(&self, event: &str, data: Value) -> Result<()> {
        if !self.kind.requires_auth() {
            tracing::warn!("Client events need a private channel, '{}' is public", self.name);
            return Err(BroadcasttError::Channel(format!(
                "client events can not be sent on public channel '{}'",
                self.name
            )));
        }

        match EventNamespace::of(event) {
            EventNamespace::Protocol => {
                tracing::warn!("You can not send broadcastt events: {}", event);
                return Err(BroadcasttError::ReservedEvent(event.to_string()));
            }
            EventNamespace::Internal => {
                tracing::warn!("You can not send internal broadcastt events: {}", event);
                return Err(BroadcasttError::ReservedEvent(event.to_string()));
            }
            EventNamespace::Application => {}
        }

        let connection = self
            .connection
            .upgrade()
            .ok_or(BroadcasttError::NotConnected)?;
        connection.send(&Envelope::new(event, data).with_channel(&self.name))
    }

    /// Binds to `broadcastt:subscription_succeeded`; the payload carries the roster
    pub fn here(&self, callback: Callback) -> &Self {
        self.bind(protocol_events::SUBSCRIPTION_SUCCEEDED, callback)
    }

    /// Binds to `broadcastt:member_added`
    pub fn joining(&self, callback: Callback) -> &Self {
        self.bind(protocol_events::MEMBER_ADDED, callback)
    }

    /// Binds to `broadcastt:member_removed`
    pub fn leaving(&self, callback: Callback) -> &Self {
        self.bind(protocol_events::MEMBER_REMOVED, callback)
    }

    /// Entry point for events routed to this channel by name
    pub(crate) fn handle_event(&self, event: &str, data: Value) {
        self.dispatch(EventPayload::new(event, data));
    }

    /// Finishes the handshake of a private or presence channel
    pub(crate) fn on_authorized(&self, response: Option<Value>) {
        if !matches!(
            self.status(),
            ChannelStatus::Pending | ChannelStatus::Subscribed
        ) {
            tracing::debug!("Ignoring authorization of inactive channel '{}'", self.name);
            return;
        }

        let mut data = match response {
            Some(Value::Object(data)) => data,
            _ => {
                tracing::warn!(
                    "Authorization for channel '{}' failed, subscription stays pending",
                    self.name
                );
                self.emit(
                    protocol_events::SUBSCRIPTION_ERROR,
                    json!({ "channel": self.name }),
                );
                return;
            }
        };

        if self.kind.tracks_members() {
            let me = MemberInfo::from_auth_response(&Value::Object(data.clone()));
            let mut state = self.lock();
            if let Some(members) = state.members.as_mut() {
                members.me = me.clone();
            }
            state.me = me;
        }

        data.insert("channel".to_string(), Value::String(self.name.clone()));
        if let Some(connection) = self.connection.upgrade() {
            self.send_frame(&connection, protocol_events::SUBSCRIBE, Value::Object(data));
        }
    }

    fn dispatch(&self, payload: EventPayload) {
        let listener = self.lock().listeners.first(&payload.event);
        match listener {
            Some(Listener::User(callback)) => callback(&payload),
            Some(Listener::Internal(handler)) => self.on_internal(handler, payload.data),
            None => tracing::trace!("No listener for '{}' on '{}'", payload.event, self.name),
        }
    }

    fn on_internal(&self, handler: InternalHandler, data: Value) {
        match handler {
            InternalHandler::SubscriptionSucceeded => {
                let members = {
                    let mut state = self.lock();
                    if !matches!(
                        state.status,
                        ChannelStatus::Pending | ChannelStatus::Subscribed
                    ) {
                        tracing::debug!(
                            "Ignoring subscription_succeeded for inactive channel '{}'",
                            self.name
                        );
                        return;
                    }
                    state.status = ChannelStatus::Subscribed;

                    if self.kind.tracks_members() {
                        let me = state.me.clone();
                        let members = state.members.get_or_insert_with(Members::new);
                        if me.is_some() {
                            members.me = me;
                        }
                        if let Some(presence) = data.get("presence") {
                            members.merge_presence(presence);
                        }
                        Some(members.clone())
                    } else {
                        None
                    }
                };

                tracing::debug!("Subscribed to '{}'", self.name);
                self.emit_with_members(protocol_events::SUBSCRIPTION_SUCCEEDED, data, members);
            }
            InternalHandler::MemberAdded | InternalHandler::MemberRemoved => {
                let (event, members) = {
                    let mut state = self.lock();
                    let subscribed = state.status == ChannelStatus::Subscribed;
                    let Some(members) = state.members.as_mut().filter(|_| subscribed) else {
                        tracing::debug!(
                            "Dropping member event for '{}' without an active roster",
                            self.name
                        );
                        return;
                    };
                    let event = if handler == InternalHandler::MemberAdded {
                        members.add(&data);
                        protocol_events::MEMBER_ADDED
                    } else {
                        members.remove(&data);
                        protocol_events::MEMBER_REMOVED
                    };
                    (event, members.clone())
                };

                self.emit_with_members(event, data, Some(members));
            }
        }
    }

    fn emit_with_members(&self, event: &str, data: Value, members: Option<Members>) {
        let payload = EventPayload::new(event, data);
        self.dispatch(match members {
            Some(members) => payload.with_members(members),
            None => payload,
        });
    }

    fn send_frame(&self, connection: &ConnectionManager, event: &str, data: Value) {
        if let Err(e) = connection.send(&Envelope::new(event, data)) {
            tracing::debug!("'{}' for channel '{}' not sent: {}", event, self.name, e);
        }
    }
}
