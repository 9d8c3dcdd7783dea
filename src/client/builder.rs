use super::{BroadcasttClient, ConnectionManager};
use crate::infrastructure::{Authorizer, HttpAuthorizer};
use crate::types::constants::{
    DEFAULT_ACTIVITY_TIMEOUT, DEFAULT_AUTH_ENDPOINT, DEFAULT_HOST, DEFAULT_INSECURE_PORT,
    DEFAULT_MAXIMUM_RECONNECTS, DEFAULT_PONG_TIMEOUT, DEFAULT_PORT, DEFAULT_RECONNECT_INTERVAL,
};
use crate::types::{BroadcasttError, Result};
use crate::websocket::{Connector, WebSocketConnector};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Immutable client configuration, shared by every component that needs it.
///
/// Build it with [`BroadcasttClientBuilder`]; values set on the builder take
/// precedence over the defaults below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcasttOptions {
    /// Application key, part of the socket URL
    pub app_key: String,
    /// Default: `eu.broadcastt.xyz`
    pub host: String,
    /// Default: `443`, or `80` when unencrypted and no port was given
    pub port: u16,
    /// `wss` when `true` (default), `ws` otherwise
    pub encrypted: bool,
    /// Base of the linear reconnect backoff. Default: 3 s
    pub reconnect_interval: Duration,
    /// Silence before a ping is sent. Default: 120 s, superseded by the server's value
    pub activity_timeout: Duration,
    /// Time to wait for the pong. Default: 30 s
    pub pong_timeout: Duration,
    /// Authorization endpoint, absolute or relative to the host. Default: `/broadcasting/auth`
    pub auth_endpoint: String,
    /// Sent as `X-CSRF-TOKEN` with authorization requests
    pub csrf: Option<String>,
    /// Sent as `X-XSRF-TOKEN` when no `csrf` token is configured
    pub xsrf_token: Option<String>,
    /// Log connection lifecycle events
    pub debug: bool,
    /// Reconnect attempts before giving up. Default: 8
    pub maximum_reconnects: u32,
}

impl Default for BroadcasttOptions {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            encrypted: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            activity_timeout: DEFAULT_ACTIVITY_TIMEOUT,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            auth_endpoint: DEFAULT_AUTH_ENDPOINT.to_string(),
            csrf: None,
            xsrf_token: None,
            debug: false,
            maximum_reconnects: DEFAULT_MAXIMUM_RECONNECTS,
        }
    }
}

impl BroadcasttOptions {
    /// `scheme://host:port/apps/{app_key}`
    pub fn socket_url(&self) -> String {
        let scheme = if self.encrypted { "wss" } else { "ws" };
        format!(
            "{}://{}:{}/apps/{}",
            scheme, self.host, self.port, self.app_key
        )
    }

    /// The authorization endpoint, resolved against `http(s)://host:port` when relative
    pub fn auth_url(&self) -> Result<Url> {
        match Url::parse(&self.auth_endpoint) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let scheme = if self.encrypted { "https" } else { "http" };
                let base = Url::parse(&format!("{}://{}:{}/", scheme, self.host, self.port))?;
                Ok(base.join(&self.auth_endpoint)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Builder for BroadcasttClient that handles initialization
pub struct BroadcasttClientBuilder {
    app_key: String,
    host: Option<String>,
    port: Option<u16>,
    encrypted: Option<bool>,
    reconnect_interval: Option<Duration>,
    activity_timeout: Option<Duration>,
    pong_timeout: Option<Duration>,
    auth_endpoint: Option<String>,
    csrf: Option<String>,
    xsrf_token: Option<String>,
    debug: Option<bool>,
    maximum_reconnects: Option<u32>,
    connector: Option<Arc<dyn Connector>>,
    authorizer: Option<Arc<dyn Authorizer>>,
}

impl BroadcasttClientBuilder {
    pub fn new(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            host: None,
            port: None,
            encrypted: None,
            reconnect_interval: None,
            activity_timeout: None,
            pong_timeout: None,
            auth_endpoint: None,
            csrf: None,
            xsrf_token: None,
            debug: None,
            maximum_reconnects: None,
            connector: None,
            authorizer: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = Some(encrypted);
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = Some(interval);
        self
    }

    pub fn activity_timeout(mut self, timeout: Duration) -> Self {
        self.activity_timeout = Some(timeout);
        self
    }

    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = Some(timeout);
        self
    }

    pub fn auth_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth_endpoint = Some(endpoint.into());
        self
    }

    pub fn csrf(mut self, token: impl Into<String>) -> Self {
        self.csrf = Some(token.into());
        self
    }

    pub fn xsrf_token(mut self, token: impl Into<String>) -> Self {
        self.xsrf_token = Some(token.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn maximum_reconnects(mut self, maximum: u32) -> Self {
        self.maximum_reconnects = Some(maximum);
        self
    }

    /// Replace the WebSocket transport
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the HTTP authorizer used by private and presence channels
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Resolve the configuration: explicit values first, then defaults
    pub fn options(&self) -> Result<BroadcasttOptions> {
        if self.app_key.is_empty() {
            return Err(BroadcasttError::Config("app key is required".to_string()));
        }

        let defaults = BroadcasttOptions::default();
        let encrypted = self.encrypted.unwrap_or(defaults.encrypted);
        let port = match (self.port, encrypted) {
            (Some(port), _) => port,
            (None, false) => DEFAULT_INSECURE_PORT,
            (None, true) => defaults.port,
        };

        Ok(BroadcasttOptions {
            app_key: self.app_key.clone(),
            host: self.host.clone().unwrap_or(defaults.host),
            port,
            encrypted,
            reconnect_interval: self.reconnect_interval.unwrap_or(defaults.reconnect_interval),
            activity_timeout: self.activity_timeout.unwrap_or(defaults.activity_timeout),
            pong_timeout: self.pong_timeout.unwrap_or(defaults.pong_timeout),
            auth_endpoint: self.auth_endpoint.clone().unwrap_or(defaults.auth_endpoint),
            csrf: self.csrf.clone(),
            xsrf_token: self.xsrf_token.clone(),
            debug: self.debug.unwrap_or(defaults.debug),
            maximum_reconnects: self.maximum_reconnects.unwrap_or(defaults.maximum_reconnects),
        })
    }

    /// Build the client and spawn its event loop.
    ///
    /// Must be called from within a tokio runtime. The client does not
    /// connect until [`BroadcasttClient::connect`] is called.
    pub fn build(self) -> Result<BroadcasttClient> {
        let options = Arc::new(self.options()?);

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector));
        let authorizer = match self.authorizer {
            Some(authorizer) => authorizer,
            None => Arc::new(HttpAuthorizer::from_options(&options)?),
        };

        let (connection, events) =
            ConnectionManager::new(Arc::clone(&options), connector, authorizer);
        connection.spawn_event_loop(events);

        Ok(BroadcasttClient {
            options,
            connection,
        })
    }
}
