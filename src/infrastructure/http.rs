use crate::client::BroadcasttOptions;
use crate::types::{BroadcasttError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Body of the authorization request for private and presence channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequest {
    pub socket_id: String,
    pub channel_name: String,
}

/// Obtains the signed subscription data for a private or presence channel.
///
/// `Ok(None)` means the endpoint refused or answered without a body; the
/// channel then stays pending.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &AuthRequest) -> Result<Option<Value>>;
}

/// Authorizes channels by POSTing to the application's auth endpoint
pub struct HttpAuthorizer {
    endpoint: Url,
    csrf_token: Option<String>,
    xsrf_token: Option<String>,
    http: reqwest::Client,
}

impl HttpAuthorizer {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            csrf_token: None,
            xsrf_token: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_options(options: &BroadcasttOptions) -> Result<Self> {
        Ok(Self::new(options.auth_url()?)
            .with_csrf_token(options.csrf.clone())
            .with_xsrf_token(options.xsrf_token.clone()))
    }

    pub fn with_csrf_token(mut self, token: Option<String>) -> Self {
        self.csrf_token = token;
        self
    }

    pub fn with_xsrf_token(mut self, token: Option<String>) -> Self {
        self.xsrf_token = token;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Authorizer for HttpAuthorizer {
    async fn authorize(&self, request: &AuthRequest) -> Result<Option<Value>> {
        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(request);

        if let Some(token) = &self.csrf_token {
            builder = builder.header("X-CSRF-TOKEN", token);
        } else if let Some(token) = &self.xsrf_token {
            builder = builder.header("X-XSRF-TOKEN", token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BroadcasttError::Auth(format!("authorization request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            tracing::warn!(
                "Authorization for channel '{}' failed with status: {}",
                request.channel_name,
                response.status()
            );
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            tracing::warn!(
                "Authorization for channel '{}' returned an empty body",
                request.channel_name
            );
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&body)?))
    }
}

/// Reads the `XSRF-TOKEN` value out of a `Cookie` header
pub fn xsrf_token_from_cookies(cookie_header: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "XSRF-TOKEN")
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}
