use super::{BroadcasttOptions, ClientState, ConnectionState};
use crate::channel::Channel;
use crate::infrastructure::{
    AuthRequest, Authorizer, GiveUpReason, HeartbeatSink, HeartbeatStage, ReconnectDecision,
    ReconnectPolicy, ScheduledTask, TaskManager,
};
use crate::messaging::{ControlEvent, MessageRouter, Route};
use crate::types::constants::{WS_CLOSE_NORMAL, protocol_events};
use crate::types::{BroadcasttError, Envelope, Result};
use crate::websocket::{Connector, TransportEvent, TransportSink};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Everything the connection reacts to, posted by transports, timers and
/// authorization requests and consumed in order by the event loop
#[derive(Debug)]
pub(crate) enum ConnectionEvent {
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    HeartbeatDue {
        generation: u64,
        seq: u64,
        stage: HeartbeatStage,
    },
    ReconnectDue {
        generation: u64,
    },
    Authorized {
        channel: String,
        socket_id: String,
        response: Option<Value>,
    },
}

/// Owns the transport, the heartbeat, the reconnect policy and the channel pool.
///
/// All transitions happen in [`handle`](Self::handle), called from a single
/// event loop task. Application calls (`join`, `disconnect`, channel
/// subscribes) take the same lock, and listener callbacks always run with
/// the lock released.
pub struct ConnectionManager {
    options: Arc<BroadcasttOptions>,
    connector: Arc<dyn Connector>,
    authorizer: Arc<dyn Authorizer>,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: Mutex<ClientState>,
    tasks: Mutex<TaskManager>,
    shutdown: CancellationToken,
    me: Weak<ConnectionManager>,
}

impl ConnectionManager {
    pub(crate) fn new(
        options: Arc<BroadcasttOptions>,
        connector: Arc<dyn Connector>,
        authorizer: Arc<dyn Authorizer>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let tasks = TaskManager::new();
        let shutdown = tasks.token().clone();

        let manager = Arc::new_cyclic(|me| Self {
            policy: ReconnectPolicy::new(options.reconnect_interval, options.maximum_reconnects),
            state: Mutex::new(ClientState::new(options.activity_timeout, options.pong_timeout)),
            options,
            connector,
            authorizer,
            events,
            tasks: Mutex::new(tasks),
            shutdown,
            me: me.clone(),
        });

        (manager, receiver)
    }

    /// Spawn the task that feeds queued events into [`handle`](Self::handle)
    pub(crate) fn spawn_event_loop(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        let manager = Arc::downgrade(self);
        self.lock_tasks().spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle(event);
            }
            tracing::debug!("Connection event loop stopped");
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, TaskManager> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn options(&self) -> &BroadcasttOptions {
        &self.options
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_state().status
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.lock_state().state_change_tx.subscribe()
    }

    pub fn socket_id(&self) -> Option<String> {
        self.lock_state().socket_id.clone()
    }

    pub fn error_code(&self) -> Option<u16> {
        self.lock_state().error_code
    }

    pub fn is_connected(&self) -> bool {
        self.lock_state().is_transport_open()
    }

    /// True while a reconnect is scheduled or its transport is opening.
    ///
    /// Stays false once the reconnect budget is used up, even though the
    /// state is still [`ConnectionState::Reconnecting`].
    pub fn is_reconnecting(&self) -> bool {
        let state = self.lock_state();
        state.status == ConnectionState::Reconnecting
            && (state.reconnect_timer.is_some() || state.transport.is_some())
    }

    /// Opens a transport unless one is already open or opening.
    ///
    /// Clears the previous error code and socket id.
    pub fn start(&self) {
        let mut state = self.lock_state();
        if state.transport.is_some() {
            tracing::debug!("Transport already open or opening, not starting another");
            return;
        }

        state.closed_by_client = false;
        state.reconnect_timer = None;
        state.generation += 1;
        state.error_code = None;
        state.socket_id = None;
        if state.status != ConnectionState::Reconnecting {
            state.set_status(ConnectionState::Connecting);
        }

        let url = self.options.socket_url();
        if self.options.debug {
            tracing::info!("Broadcastt: Connecting to {}", url);
        }

        let sink = self.transport_sink(state.generation);
        state.transport = Some(self.connector.open(&url, sink));
    }

    /// Closes the transport with code 1000. No reconnect follows.
    ///
    /// The state returns to [`ConnectionState::Connecting`], as before the
    /// first [`start()`](Self::start).
    pub fn disconnect(&self) {
        let mut state = self.lock_state();
        state.closed_by_client = true;
        state.reconnect_timer = None;
        state.reconnects = 0;
        state.heartbeat.stop();
        state.socket_id = None;
        state.set_status(ConnectionState::Connecting);
        // Events of the transport being closed are stale from here on
        state.generation += 1;

        if let Some(transport) = state.transport.take() {
            transport.close(WS_CLOSE_NORMAL, "");
        }

        if self.options.debug {
            tracing::info!("Broadcastt: Disconnected by client");
        }
    }

    /// Writes an envelope to the transport.
    ///
    /// Returns [`BroadcasttError::NotConnected`] when no transport is open; the
    /// frame is dropped.
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        let state = self.lock_state();
        match &state.transport {
            Some(transport) if transport.is_open() => transport.send(text),
            _ => {
                tracing::debug!("Dropping '{}': transport is not open", envelope.event);
                Err(BroadcasttError::NotConnected)
            }
        }
    }

    /// Returns the channel named `name`, creating it on first use.
    ///
    /// The channel subscribes right away when connected; otherwise it is
    /// subscribed once the connection is established.
    pub fn join(&self, name: &str) -> Arc<Channel> {
        let (channel, connected) = {
            let mut state = self.lock_state();
            let channel = match state.find_channel(name) {
                Some(channel) => channel,
                None => {
                    let channel = Arc::new(Channel::new(name, self.me.clone()));
                    state.channels.push(Arc::clone(&channel));
                    channel
                }
            };
            let connected =
                state.status == ConnectionState::Connected && state.is_transport_open();
            (channel, connected)
        };

        if connected {
            channel.subscribe();
        }
        channel
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.lock_state().find_channel(name)
    }

    /// Unsubscribes the channel named `name`, if it was joined
    pub fn leave(&self, name: &str) {
        if let Some(channel) = self.get(name) {
            channel.unsubscribe();
        }
    }

    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.lock_state().channels.clone()
    }

    /// Adds a channel to the pool unless one with the same name is there
    pub(crate) fn register(&self, channel: &Arc<Channel>) {
        let mut state = self.lock_state();
        if state.find_channel(channel.name()).is_none() {
            state.channels.push(Arc::clone(channel));
        }
    }

    /// Starts the authorization request of a private or presence channel.
    ///
    /// Without a socket id there is nothing to authorize yet; the channel is
    /// subscribed again once the connection is established.
    pub(crate) fn request_authorization(&self, channel_name: &str) {
        let Some(socket_id) = self.socket_id() else {
            tracing::debug!(
                "No socket id yet, '{}' authorizes once connected",
                channel_name
            );
            return;
        };

        let request = AuthRequest {
            socket_id,
            channel_name: channel_name.to_string(),
        };
        let authorizer = Arc::clone(&self.authorizer);
        let events = self.events.clone();

        self.lock_tasks().spawn(async move {
            let response = match authorizer.authorize(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        "Authorization for channel '{}' failed: {}",
                        request.channel_name,
                        e
                    );
                    None
                }
            };

            let _ = events.send(ConnectionEvent::Authorized {
                channel: request.channel_name,
                socket_id: request.socket_id,
                response,
            });
        });
    }

    /// Apply one event to the state machine
    pub(crate) fn handle(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Transport { generation, event } => {
                if generation != self.lock_state().generation {
                    tracing::debug!("Ignoring event of a previous transport: {:?}", event);
                    return;
                }
                match event {
                    TransportEvent::Opened => self.on_open(),
                    TransportEvent::Message(text) => self.on_message(&text),
                    TransportEvent::Error(error) => {
                        if self.options.debug {
                            tracing::error!("Broadcastt: Error occurred: {}", error);
                        }
                    }
                    TransportEvent::Closed { code, reason } => self.on_close(code, &reason),
                }
            }
            ConnectionEvent::HeartbeatDue {
                generation,
                seq,
                stage,
            } => self.on_heartbeat(generation, seq, stage),
            ConnectionEvent::ReconnectDue { generation } => {
                {
                    let mut state = self.lock_state();
                    if generation != state.generation || state.closed_by_client {
                        return;
                    }
                    state.reconnect_timer = None;
                }
                self.start();
            }
            ConnectionEvent::Authorized {
                channel,
                socket_id,
                response,
            } => {
                if self.socket_id().as_deref() != Some(socket_id.as_str()) {
                    tracing::debug!(
                        "Discarding authorization of '{}' for an old socket id",
                        channel
                    );
                    return;
                }
                if let Some(channel) = self.get(&channel) {
                    channel.on_authorized(response);
                }
            }
        }
    }

    fn on_open(&self) {
        self.lock_state().reconnects = 0;
        if self.options.debug {
            tracing::info!("Broadcastt: Connected");
        }
    }

    fn on_message(&self, text: &str) {
        let envelope = match MessageRouter::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!("Failed to parse message: {} - Raw: {}", e, text);
                return;
            }
        };

        match MessageRouter::route(envelope) {
            Route::Control { event, data } => match event {
                ControlEvent::ConnectionEstablished => self.on_connection_established(&data),
                ControlEvent::Pong => {
                    let mut state = self.lock_state();
                    let sink = self.heartbeat_sink(state.generation);
                    state.heartbeat.reset(&self.shutdown, sink);
                }
                ControlEvent::Error => self.on_protocol_error(&data),
            },
            Route::Channel {
                channel,
                event,
                data,
            } => match self.get(&channel) {
                Some(channel) => channel.handle_event(&event, data),
                None => tracing::debug!("No channel '{}' for event '{}'", channel, event),
            },
            Route::Unroutable { event } => {
                tracing::debug!("Dropping event '{}' without channel", event);
            }
        }
    }

    fn on_connection_established(&self, data: &Value) {
        let channels = {
            let mut state = self.lock_state();
            state.socket_id = match data.get("socket_id") {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            };
            if let Some(seconds) = data.get("activity_timeout").and_then(Value::as_u64) {
                state
                    .heartbeat
                    .set_activity_timeout(Duration::from_secs(seconds));
            }

            let sink = self.heartbeat_sink(state.generation);
            state.heartbeat.reset(&self.shutdown, sink);
            state.set_status(ConnectionState::Connected);

            tracing::info!(
                "Connection established, socket id: {:?}",
                state.socket_id
            );
            state.channels.clone()
        };

        // A fresh transport has no subscriptions on the server side
        for channel in channels {
            channel.resubscribe();
        }
    }

    fn on_protocol_error(&self, data: &Value) {
        let code = data
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok());
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();

        tracing::warn!("Server error {:?}: {}", code, message);

        let mut state = self.lock_state();
        state.set_status(ConnectionState::Error);
        if code.is_some() {
            state.error_code = code;
        }

        if let Some(code) = code
            && let Some(transport) = &state.transport
        {
            transport.close(code, message);
        }
    }

    fn on_close(&self, code: u16, reason: &str) {
        let mut state = self.lock_state();
        state.transport = None;
        state.socket_id = None;
        state.heartbeat.stop();

        if self.options.debug {
            tracing::info!("Broadcastt: Disconnected ({} {})", code, reason);
        }

        if state.closed_by_client {
            return;
        }

        let error_code = state.error_code.or(Some(code));
        match self.policy.decide(error_code, state.reconnects) {
            ReconnectDecision::GiveUp(GiveUpReason::FatalError(code)) => {
                tracing::warn!("Not reconnecting after fatal error code {}", code);
                state.set_status(ConnectionState::Error);
            }
            ReconnectDecision::GiveUp(GiveUpReason::Exhausted) => {
                tracing::warn!(
                    "Not reconnecting, {} attempts used up",
                    self.options.maximum_reconnects
                );
            }
            ReconnectDecision::Retry { attempt, delay } => {
                state.reconnects = attempt;
                state.set_status(ConnectionState::Reconnecting);

                if self.options.debug {
                    tracing::info!(
                        "Broadcastt: Try to reconnect in {}s",
                        delay.as_secs_f64()
                    );
                }

                let generation = state.generation;
                let events = self.events.clone();
                state.reconnect_timer = Some(ScheduledTask::after(delay, &self.shutdown, move || {
                    let _ = events.send(ConnectionEvent::ReconnectDue { generation });
                }));
            }
        }
    }

    fn on_heartbeat(&self, generation: u64, seq: u64, stage: HeartbeatStage) {
        let mut state = self.lock_state();
        if generation != state.generation || !state.heartbeat.is_current(seq) {
            return;
        }

        match stage {
            HeartbeatStage::Activity => {
                let ping = Envelope::new(protocol_events::PING, json!({}));
                if let Some(transport) = &state.transport
                    && let Ok(text) = serde_json::to_string(&ping)
                    && let Err(e) = transport.send(text)
                {
                    tracing::debug!("Ping not sent: {}", e);
                }

                let sink = self.heartbeat_sink(generation);
                state.heartbeat.await_pong(&self.shutdown, sink);
            }
            HeartbeatStage::PongTimeout => {
                tracing::warn!("No pong received, closing the connection");
                if let Some(transport) = &state.transport {
                    transport.close(WS_CLOSE_NORMAL, "pong timeout");
                }
            }
        }
    }

    fn transport_sink(&self, generation: u64) -> TransportSink {
        let events = self.events.clone();
        Arc::new(move |event| {
            let _ = events.send(ConnectionEvent::Transport { generation, event });
        })
    }

    fn heartbeat_sink(&self, generation: u64) -> HeartbeatSink {
        let events = self.events.clone();
        Arc::new(move |stage, seq| {
            let _ = events.send(ConnectionEvent::HeartbeatDue {
                generation,
                seq,
                stage,
            });
        })
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelStatus, EventPayload};
    use crate::client::BroadcasttClientBuilder;
    use crate::testing::{MockConnector, StubAuthorizer};
    use crate::types::constants::internal_events;

    struct Harness {
        manager: Arc<ConnectionManager>,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        connector: Arc<MockConnector>,
        authorizer: Arc<StubAuthorizer>,
    }

    impl Harness {
        fn new(builder: BroadcasttClientBuilder) -> Self {
            Self::with_authorizer(builder, StubAuthorizer::new(Some(json!({"auth": "key:sig"}))))
        }

        fn with_authorizer(builder: BroadcasttClientBuilder, authorizer: StubAuthorizer) -> Self {
            let options = Arc::new(builder.options().unwrap());
            let connector = Arc::new(MockConnector::default());
            let authorizer = Arc::new(authorizer);
            let (manager, events) = ConnectionManager::new(
                options,
                Arc::clone(&connector) as Arc<dyn Connector>,
                Arc::clone(&authorizer) as Arc<dyn Authorizer>,
            );
            Self {
                manager,
                events,
                connector,
                authorizer,
            }
        }

        fn pump(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.manager.handle(event);
            }
        }

        /// Let spawned tasks run, then apply what they posted
        async fn settle(&mut self) {
            for _ in 0..4 {
                tokio::task::yield_now().await;
                self.pump();
            }
        }

        /// Advance the paused clock past `duration`, then apply due events
        async fn wait(&mut self, duration: Duration) {
            tokio::time::sleep(duration + Duration::from_millis(1)).await;
            self.settle().await;
        }

        fn connect(&mut self, socket_id: &str) {
            self.manager.start();
            self.connector.last().establish(socket_id);
            self.pump();
        }
    }

    fn builder() -> BroadcasttClientBuilder {
        BroadcasttClientBuilder::new("app-key")
    }

    fn succeed(channel: &str) -> Value {
        json!({
            "event": internal_events::SUBSCRIPTION_SUCCEEDED,
            "channel": channel,
            "data": "{}",
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_opens_the_app_url() {
        let mut h = Harness::new(builder());

        h.manager.start();
        h.manager.start();

        assert_eq!(h.connector.opened(), 1);
        assert_eq!(h.connector.last().url, "wss://eu.broadcastt.xyz:443/apps/app-key");
        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        h.pump();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_established_stores_socket_id() {
        let mut h = Harness::new(builder());

        h.connect("123.456");

        assert_eq!(h.manager.state(), ConnectionState::Connected);
        assert_eq!(h.manager.socket_id().as_deref(), Some("123.456"));
        assert!(h.manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_unknown_channel_is_none() {
        let h = Harness::new(builder());

        assert!(h.manager.get("never-joined").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_is_idempotent() {
        let h = Harness::new(builder());

        let first = h.manager.join("orders");
        let second = h.manager.join("orders");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(h.manager.channels().len(), 1);
        assert!(Arc::ptr_eq(&h.manager.get("orders").unwrap(), &first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_before_connect_subscribes_on_establish() {
        let mut h = Harness::new(builder());

        let channel = h.manager.join("orders");
        assert_eq!(channel.status(), ChannelStatus::None);

        h.connect("1.1");

        let sent = h.connector.last().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, protocol_events::SUBSCRIBE);
        assert_eq!(sent[0].data, json!({"channel": "orders"}));
        assert_eq!(channel.status(), ChannelStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_while_connected_subscribes_immediately() {
        let mut h = Harness::new(builder());
        h.connect("1.1");

        h.manager.join("orders");
        h.manager.join("orders");

        assert_eq!(h.connector.last().sent_events(), vec![protocol_events::SUBSCRIBE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_events_are_routed_by_name() {
        let mut h = Harness::new(builder());
        h.connect("1.1");
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);
        h.manager.join("orders").bind(
            "order-shipped",
            Arc::new(move |payload: &EventPayload| log.lock().unwrap().push(payload.data.clone())),
        );

        let socket = h.connector.last();
        socket.deliver(json!({"event": "order-shipped", "channel": "orders", "data": "{\"id\":7}"}));
        socket.deliver(json!({"event": "order-shipped", "channel": "other", "data": "{\"id\":8}"}));
        h.pump();

        assert_eq!(*received.lock().unwrap(), vec![json!({"id": 7})]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resubscribes_subscribed_channels() {
        let mut h = Harness::new(builder());
        h.connect("1.1");
        let orders = h.manager.join("orders");
        let left = h.manager.join("left");
        h.connector.last().deliver(succeed("orders"));
        h.pump();
        h.manager.leave("left");
        assert_eq!(orders.status(), ChannelStatus::Subscribed);

        h.connector.last().drop_with(1006);
        h.pump();
        assert_eq!(h.manager.state(), ConnectionState::Reconnecting);
        assert_eq!(h.manager.socket_id(), None);

        h.wait(Duration::from_secs(3)).await;
        assert_eq!(h.connector.opened(), 2);

        h.connector.last().establish("2.2");
        h.pump();

        let sent = h.connector.last().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data, json!({"channel": "orders"}));
        assert_eq!(orders.status(), ChannelStatus::Subscribed);
        assert_eq!(left.status(), ChannelStatus::Unsubscribed);
        assert_eq!(h.manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_code_stops_reconnecting() {
        let mut h = Harness::new(builder());
        h.connect("1.1");

        h.connector.last().deliver(json!({
            "event": protocol_events::ERROR,
            "data": {"code": 4050, "message": "Over capacity"},
        }));
        h.pump();

        assert_eq!(
            h.connector.last().closed_with(),
            Some((4050, "Over capacity".to_string()))
        );
        assert_eq!(h.manager.state(), ConnectionState::Error);
        assert_eq!(h.manager.error_code(), Some(4050));

        h.wait(Duration::from_secs(600)).await;
        assert_eq!(h.connector.opened(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_retry_code_reconnects_without_delay() {
        let mut h = Harness::new(builder());
        h.connect("1.1");

        h.connector.last().deliver(json!({
            "event": protocol_events::ERROR,
            "data": {"code": 4250, "message": "Reconnect now"},
        }));
        h.pump();
        assert_eq!(h.manager.state(), ConnectionState::Reconnecting);

        h.wait(Duration::ZERO).await;
        assert_eq!(h.connector.opened(), 2);
        assert_eq!(h.manager.error_code(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_linearly() {
        let mut h = Harness::new(builder());
        h.manager.start();

        // First attempt after 3 s
        h.connector.last().drop_with(1006);
        h.pump();
        h.wait(Duration::from_millis(2900)).await;
        assert_eq!(h.connector.opened(), 1);
        h.wait(Duration::from_millis(100)).await;
        assert_eq!(h.connector.opened(), 2);

        // Second attempt after 6 s
        h.connector.last().drop_with(1000);
        h.pump();
        h.wait(Duration::from_millis(5900)).await;
        assert_eq!(h.connector.opened(), 2);
        h.wait(Duration::from_millis(100)).await;
        assert_eq!(h.connector.opened(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_budget_is_respected() {
        let mut h = Harness::new(
            builder()
                .maximum_reconnects(2)
                .reconnect_interval(Duration::from_secs(1)),
        );
        h.manager.start();

        for _ in 0..4 {
            h.connector.last().drop_with(1006);
            h.pump();
            h.wait(Duration::from_secs(60)).await;
        }

        assert_eq!(h.connector.opened(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_the_counter() {
        let mut h = Harness::new(
            builder()
                .maximum_reconnects(1)
                .reconnect_interval(Duration::from_secs(1)),
        );
        h.connect("1.1");

        for _ in 0..3 {
            h.connector.last().drop_with(1006);
            h.pump();
            h.wait(Duration::from_secs(5)).await;
            h.connector.last().establish("again");
            h.pump();
        }

        assert_eq!(h.connector.opened(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_of_previous_transport_are_ignored() {
        let mut h = Harness::new(builder());
        h.connect("1.1");
        let old = h.connector.last();

        old.drop_with(1006);
        h.pump();
        h.wait(Duration::from_secs(3)).await;
        h.connector.last().establish("2.2");
        h.pump();

        old.establish("stale");
        old.drop_with(1006);
        h.pump();

        assert_eq!(h.manager.socket_id().as_deref(), Some("2.2"));
        assert_eq!(h.manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pings_then_closes_without_pong() {
        let mut h = Harness::new(builder());
        h.manager.start();
        let socket = h.connector.last();
        socket.accept();
        socket.deliver(json!({
            "event": protocol_events::CONNECTION_ESTABLISHED,
            "data": "{\"socket_id\":\"1.1\",\"activity_timeout\":10}",
        }));
        h.pump();

        h.wait(Duration::from_secs(9)).await;
        assert!(socket.sent_events().is_empty());

        h.wait(Duration::from_secs(1)).await;
        assert_eq!(socket.sent_events(), vec![protocol_events::PING]);
        assert_eq!(socket.sent()[0].data, json!({}));

        h.wait(Duration::from_secs(30)).await;
        assert!(socket.closed_with().is_some());
        assert_eq!(h.manager.state(), ConnectionState::Reconnecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_rearms_the_activity_check() {
        let mut h = Harness::new(builder().pong_timeout(Duration::from_secs(5)));
        h.connect("1.1");
        let socket = h.connector.last();

        h.wait(Duration::from_secs(120)).await;
        assert_eq!(socket.sent_events(), vec![protocol_events::PING]);

        socket.deliver(json!({"event": protocol_events::PONG, "data": {}}));
        h.pump();
        h.wait(Duration::from_secs(10)).await;

        assert_eq!(socket.closed_with(), None);
        assert_eq!(socket.sent_events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_channel_authorizes_before_subscribing() {
        let mut h = Harness::new(builder());
        h.connect("123.456");

        let channel = h.manager.join("private-orders");
        assert!(h.connector.last().sent().is_empty());
        h.settle().await;

        let requests = h.authorizer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].socket_id, "123.456");
        assert_eq!(requests[0].channel_name, "private-orders");

        let sent = h.connector.last().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, protocol_events::SUBSCRIBE);
        assert_eq!(
            sent[0].data,
            json!({"auth": "key:sig", "channel": "private-orders"})
        );
        assert_eq!(channel.status(), ChannelStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_authorization_keeps_channel_pending() {
        let mut h = Harness::with_authorizer(builder(), StubAuthorizer::new(None));
        h.connect("1.1");
        let errors = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&errors);

        let channel = h.manager.join("private-orders");
        channel.bind(
            protocol_events::SUBSCRIPTION_ERROR,
            Arc::new(move |payload: &EventPayload| log.lock().unwrap().push(payload.data.clone())),
        );
        h.settle().await;

        assert!(h.connector.last().sent().is_empty());
        assert_eq!(channel.status(), ChannelStatus::Pending);
        assert_eq!(
            *errors.lock().unwrap(),
            vec![json!({"channel": "private-orders"})]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorization_for_old_socket_is_discarded() {
        let mut h = Harness::new(builder());
        h.connect("1.1");
        h.manager.join("private-orders");

        // The socket changes before the authorization is applied
        h.connector.last().drop_with(1006);
        h.settle().await;

        assert_eq!(h.authorizer.requests().len(), 1);
        assert!(h.connector.last().sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_never_reconnects() {
        let mut h = Harness::new(builder());
        h.connect("1.1");
        let socket = h.connector.last();

        h.manager.disconnect();
        h.pump();
        h.wait(Duration::from_secs(600)).await;

        assert_eq!(socket.closed_with(), Some((1000, String::new())));
        assert_eq!(h.connector.opened(), 1);
        assert_eq!(h.manager.socket_id(), None);
        assert!(!h.manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let mut h = Harness::new(builder());
        h.connect("1.1");

        h.connector.last().drop_with(1006);
        h.pump();
        h.manager.disconnect();
        h.wait(Duration::from_secs(60)).await;

        assert_eq!(h.connector.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_leaves_connected_state() {
        let mut h = Harness::new(builder());
        h.connect("1.1");
        assert_eq!(h.manager.state(), ConnectionState::Connected);

        h.manager.disconnect();
        h.pump();
        assert_eq!(h.manager.state(), ConnectionState::Connecting);

        let orders = h.manager.join("orders");
        assert_eq!(orders.status(), ChannelStatus::None);

        h.connect("2.2");
        assert_eq!(h.connector.opened(), 2);
        assert_eq!(orders.status(), ChannelStatus::Pending);
        assert_eq!(h.connector.last().sent_events(), vec![protocol_events::SUBSCRIBE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_while_reconnecting_repeats_the_handshake() {
        let mut h = Harness::new(builder());
        h.connect("1.1");
        let orders = h.manager.join("orders");
        h.connector.last().deliver(succeed("orders"));
        h.pump();

        orders.subscribe();
        assert_eq!(h.connector.last().sent_events().len(), 1);

        h.connector.last().drop_with(1006);
        h.pump();
        h.wait(Duration::from_secs(3)).await;
        assert_eq!(h.connector.opened(), 2);

        let socket = h.connector.last();
        socket.accept();
        h.pump();
        assert_eq!(h.manager.state(), ConnectionState::Reconnecting);

        orders.subscribe();

        assert_eq!(socket.sent_events(), vec![protocol_events::SUBSCRIBE]);
        assert_eq!(orders.status(), ChannelStatus::Subscribed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_is_observable() {
        let mut h = Harness::new(
            builder()
                .maximum_reconnects(1)
                .reconnect_interval(Duration::from_secs(1)),
        );
        h.connect("1.1");

        h.connector.last().drop_with(1006);
        h.pump();
        assert!(h.manager.is_reconnecting());

        h.wait(Duration::from_secs(1)).await;
        assert_eq!(h.connector.opened(), 2);
        assert!(h.manager.is_reconnecting());

        h.connector.last().drop_with(1006);
        h.pump();
        h.wait(Duration::from_secs(60)).await;

        assert_eq!(h.connector.opened(), 2);
        assert_eq!(h.manager.state(), ConnectionState::Reconnecting);
        assert!(!h.manager.is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_without_transport_fails_quietly() {
        let h = Harness::new(builder());

        let result = h.manager.send(&Envelope::new("client-event", json!({})));

        assert!(matches!(result, Err(BroadcasttError::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_changes_are_broadcast() {
        let mut h = Harness::new(builder());
        let mut states = h.manager.state_receiver();

        h.connect("1.1");

        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);
    }
}
