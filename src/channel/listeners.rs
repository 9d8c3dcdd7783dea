use super::presence::Members;
use crate::messaging::is_internal;
use serde_json::Value;
use std::sync::Arc;

/// Application callback bound to a channel event.
///
/// Callbacks are compared by pointer when unbinding, so keep a clone of the
/// `Arc` around if you intend to remove one specific callback later.
pub type Callback = Arc<dyn Fn(&EventPayload) + Send + Sync + 'static>;

/// What a callback receives when its event is emitted
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    /// Name of the emitted event
    pub event: String,
    /// Decoded event data (`Value::Null` for events without data)
    pub data: Value,
    /// Presence roster snapshot, attached to presence events only
    pub members: Option<Members>,
}

impl EventPayload {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            members: None,
        }
    }

    pub fn with_members(mut self, members: Members) -> Self {
        self.members = Some(members);
        self
    }
}

/// Built-in reactions a channel installs for the internal namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InternalHandler {
    SubscriptionSucceeded,
    MemberAdded,
    MemberRemoved,
}

#[derive(Clone)]
pub(crate) enum Listener {
    Internal(InternalHandler),
    User(Callback),
}

struct Binding {
    event: String,
    listener: Listener,
}

impl Binding {
    fn is_user(&self) -> bool {
        matches!(self.listener, Listener::User(_))
    }

    fn has_callback(&self, callback: &Callback) -> bool {
        match &self.listener {
            Listener::User(bound) => Arc::ptr_eq(bound, callback),
            Listener::Internal(_) => false,
        }
    }
}

/// Per-channel store of `(event name, listener)` bindings, kept in bind order
#[derive(Default)]
pub struct ListenerRegistry {
    bindings: Vec<Binding>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a built-in listener; only the owning channel does this
    pub(crate) fn install(&mut self, event: &str, handler: InternalHandler) {
        self.bindings.push(Binding {
            event: event.to_string(),
            listener: Listener::Internal(handler),
        });
    }

    /// Adds an application binding. Returns `false` for reserved event names.
    pub fn bind(&mut self, event: &str, callback: Callback) -> bool {
        if is_internal(event) {
            tracing::warn!("You can not bind to internal events: {}", event);
            return false;
        }

        self.bindings.push(Binding {
            event: event.to_string(),
            listener: Listener::User(callback),
        });
        true
    }

    /// Removes application bindings.
    ///
    /// - no arguments: every application binding
    /// - `event` only: every binding for that event
    /// - `callback` only: every binding of that callback
    /// - both: bindings matching the event and the callback
    ///
    /// Built-in bindings always survive. Returns `false` when `event` is reserved.
    pub fn unbind(&mut self, event: Option<&str>, callback: Option<&Callback>) -> bool {
        if let Some(event) = event
            && is_internal(event)
        {
            tracing::warn!("You can not unbind internal events: {}", event);
            return false;
        }

        self.bindings.retain(|binding| {
            if !binding.is_user() {
                return true;
            }
            let event_matches = event.is_none_or(|e| binding.event == e);
            let callback_matches = callback.is_none_or(|c| binding.has_callback(c));
            !(event_matches && callback_matches)
        });
        true
    }

    /// The first listener bound to `event`
    pub(crate) fn first(&self, event: &str) -> Option<Listener> {
        self.bindings
            .iter()
            .find(|binding| binding.event == event)
            .map(|binding| binding.listener.clone())
    }

    /// Number of application bindings for `event`
    pub fn count(&self, event: &str) -> usize {
        self.bindings
            .iter()
            .filter(|binding| binding.is_user() && binding.event == event)
            .count()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
