//! 5sim HTTP client.

use super::errors::{FiveSimError, Result};
use super::types::{OrderResponse, PricesResponse, Profile};
use crate::types::OrderId;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

#[cfg(feature = "otel")]
use opentelemetry::trace::Status;
#[cfg(feature = "otel")]
use tracing::Span;
#[cfg(feature = "otel")]
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Default 5sim API base URL.
pub const DEFAULT_API_URL: &str = "https://5sim.net/v1/";

/// Order actions sharing the `/user/{action}/{id}` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    /// Poll the order.
    Check,
    /// Cancel and refund.
    Cancel,
    /// Mark complete.
    Finish,
    /// Report the number.
    Ban,
}

impl OrderAction {
    fn path(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Cancel => "cancel",
            Self::Finish => "finish",
            Self::Ban => "ban",
        }
    }
}

/// 5sim HTTP client.
///
/// REST/JSON API authenticated with a bearer token. Failures come back as
/// lowercase plain-text messages, sometimes with HTTP 200.
#[derive(Clone)]
pub struct FiveSimClient {
    http_client: ClientWithMiddleware,
    api_key: SecretString,
    endpoint: Url,
}

impl std::fmt::Debug for FiveSimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiveSimClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Builder for configuring a [`FiveSimClient`].
pub struct FiveSimClientBuilder {
    api_key: String,
    endpoint: Option<Url>,
    http_client: Option<ClientWithMiddleware>,
}

impl FiveSimClientBuilder {
    /// Create a new builder with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: None,
            http_client: None,
        }
    }

    /// Set a custom API base URL (the `/v1/` root).
    pub fn endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set a custom HTTP client with middleware.
    pub fn http_client(mut self, client: ClientWithMiddleware) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the [`FiveSimClient`].
    pub fn build(self) -> Result<FiveSimClient> {
        let mut endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => Url::parse(DEFAULT_API_URL).map_err(FiveSimError::InvalidEndpoint)?,
        };
        // Relative joins drop the last segment otherwise
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let client = reqwest::Client::builder()
                    .build()
                    .map_err(FiveSimError::BuildHttpClient)?;
                ClientBuilder::new(client).build()
            }
        };

        Ok(FiveSimClient {
            http_client,
            api_key: SecretString::from(self.api_key),
            endpoint,
        })
    }
}

impl FiveSimClient {
    /// Create a new 5sim client against `endpoint`.
    pub fn new(endpoint: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self> {
        let url = Url::parse(endpoint.as_ref()).map_err(FiveSimError::InvalidEndpoint)?;
        Self::builder(api_key).endpoint(url).build()
    }

    /// Create a new client with the default API URL.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Create a builder for configuring the client.
    pub fn builder(api_key: impl Into<String>) -> FiveSimClientBuilder {
        FiveSimClientBuilder::new(api_key)
    }

    /// GET `path` relative to the base URL and decode the JSON body.
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self
            .endpoint
            .join(path)
            .map_err(FiveSimError::InvalidEndpoint)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(FiveSimError::HttpRequest)?;

        let status = response.status();
        let text = response.text().await.map_err(FiveSimError::ReadResponse)?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(FiveSimError::Unauthorized);
        }
        if status.is_server_error() {
            return Err(FiveSimError::ServerStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = text.trim_start();
        if !(body.starts_with('{') || body.starts_with('[')) {
            return Err(FiveSimError::service(&text));
        }

        serde_json::from_str(body).map_err(FiveSimError::DeserializeJson)
    }

    /// Get the account profile, including the balance.
    #[tracing::instrument(name = "FiveSimClient::get_profile", skip_all)]
    pub async fn get_profile(&self) -> Result<Profile> {
        self.get("user/profile", &[]).await
    }

    /// Get prices for one product across all countries and operators.
    #[tracing::instrument(
        name = "FiveSimClient::get_prices",
        skip_all,
        fields(product = %product)
    )]
    pub async fn get_prices(&self, product: &str) -> Result<PricesResponse> {
        self.get("guest/prices", &[("product", product)]).await
    }

    /// Buy an activation number.
    #[tracing::instrument(
        name = "FiveSimClient::buy_activation",
        skip_all,
        fields(country = %country, operator = %operator, product = %product)
    )]
    pub async fn buy_activation(
        &self,
        country: &str,
        operator: &str,
        product: &str,
    ) -> Result<OrderResponse> {
        let path = format!("user/buy/activation/{country}/{operator}/{product}");
        let order: OrderResponse = self.get(&path, &[]).await?;

        #[cfg(feature = "otel")]
        Span::current().set_status(Status::Ok);

        Ok(order)
    }

    /// Run an order action and return the updated order.
    #[tracing::instrument(
        name = "FiveSimClient::order_action",
        skip_all,
        fields(order = %id, action = ?action)
    )]
    pub async fn order_action(&self, action: OrderAction, id: &OrderId) -> Result<OrderResponse> {
        let path = format!("user/{}/{}", action.path(), id);
        self.get(&path, &[]).await
    }
}
