//! Downstream messaging-session creation.

use crate::errors::RetryableError;
use crate::types::{PhoneNumber, ProxyId, SessionId};
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors from creating a messaging session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// The session endpoint URL is invalid.
    #[error("invalid session endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Network failure.
    #[error("session request failed: {0}")]
    HttpRequest(#[source] reqwest_middleware::Error),

    /// Non-2xx response.
    #[error("session creator returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not contain a session id.
    #[error("failed to parse session response: {0}")]
    ParseResponse(#[source] reqwest::Error),

    /// The creator refused the request.
    #[error("session creator rejected the request: {0}")]
    Rejected(String),
}

impl RetryableError for SessionError {
    fn is_retryable(&self) -> bool {
        match self {
            SessionError::HttpRequest(_) => true,
            SessionError::Status { status, .. } => *status >= 500 || *status == 429,
            SessionError::BuildHttpClient(_)
            | SessionError::InvalidEndpoint(_)
            | SessionError::ParseResponse(_)
            | SessionError::Rejected(_) => false,
        }
    }
}

/// External subsystem that opens a messaging session for a verified number.
#[async_trait]
pub trait SessionCreator: Send + Sync {
    /// Open a session for `phone` egressing through `proxy`.
    async fn create_session(
        &self,
        phone: &PhoneNumber,
        proxy: &ProxyId,
    ) -> Result<SessionId, SessionError>;
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    phone_number: String,
    proxy_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: String,
}

/// [`SessionCreator`] that POSTs `{phone_number, proxy_id}` as JSON and
/// reads `{session_id}` back.
#[derive(Clone)]
pub struct HttpSessionCreator {
    http_client: ClientWithMiddleware,
    endpoint: Url,
    token: Option<SecretString>,
}

impl std::fmt::Debug for HttpSessionCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSessionCreator")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpSessionCreator {
    /// Create a creator posting to `endpoint`.
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self, SessionError> {
        let endpoint = Url::parse(endpoint.as_ref())?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(SessionError::BuildHttpClient)?;
        Ok(Self {
            http_client: ClientBuilder::new(client).build(),
            endpoint,
            token: None,
        })
    }

    /// Send `token` as a bearer credential.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Use a custom HTTP client with middleware.
    pub fn with_http_client(mut self, client: ClientWithMiddleware) -> Self {
        self.http_client = client;
        self
    }
}

#[async_trait]
impl SessionCreator for HttpSessionCreator {
    #[tracing::instrument(
        name = "HttpSessionCreator::create_session",
        skip_all,
        fields(proxy = %proxy)
    )]
    async fn create_session(
        &self,
        phone: &PhoneNumber,
        proxy: &ProxyId,
    ) -> Result<SessionId, SessionError> {
        let body = CreateSessionRequest {
            phone_number: phone.with_plus_prefix(),
            proxy_id: proxy.as_str(),
        };

        let mut request = self.http_client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(SessionError::HttpRequest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CreateSessionResponse =
            response.json().await.map_err(SessionError::ParseResponse)?;
        if parsed.session_id.trim().is_empty() {
            return Err(SessionError::Rejected("empty session id".to_string()));
        }
        Ok(SessionId::new(parsed.session_id))
    }
}
