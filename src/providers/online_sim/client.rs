//! OnlineSim HTTP client.

use super::errors::{OnlineSimError, Result};
use super::types::{
    BalanceResponse, GetNumResponse, NumbersStatsResponse, OperationState, parse_body,
};
use crate::types::OrderId;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

#[cfg(feature = "otel")]
use opentelemetry::trace::Status;
#[cfg(feature = "otel")]
use tracing::Span;
#[cfg(feature = "otel")]
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Default OnlineSim API base URL.
pub const DEFAULT_API_URL: &str = "https://onlinesim.io/api/";

/// Acknowledgement body of `setOperationOk.php`.
#[derive(Debug, Deserialize)]
struct Ack {}

/// OnlineSim HTTP client.
#[derive(Clone)]
pub struct OnlineSimClient {
    http_client: ClientWithMiddleware,
    api_key: SecretString,
    endpoint: Url,
}

impl std::fmt::Debug for OnlineSimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnlineSimClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Builder for configuring an [`OnlineSimClient`].
pub struct OnlineSimClientBuilder {
    api_key: String,
    endpoint: Option<Url>,
    http_client: Option<ClientWithMiddleware>,
}

impl OnlineSimClientBuilder {
    /// Create a new builder with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: None,
            http_client: None,
        }
    }

    /// Set a custom API base URL.
    pub fn endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set a custom HTTP client with middleware.
    pub fn http_client(mut self, client: ClientWithMiddleware) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the [`OnlineSimClient`].
    pub fn build(self) -> Result<OnlineSimClient> {
        let mut endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => Url::parse(DEFAULT_API_URL).map_err(OnlineSimError::InvalidEndpoint)?,
        };
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let client = reqwest::Client::builder()
                    .build()
                    .map_err(OnlineSimError::BuildHttpClient)?;
                ClientBuilder::new(client).build()
            }
        };

        Ok(OnlineSimClient {
            http_client,
            api_key: SecretString::from(self.api_key),
            endpoint,
        })
    }
}

impl OnlineSimClient {
    /// Create a new OnlineSim client against `endpoint`.
    pub fn new(endpoint: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self> {
        let url = Url::parse(endpoint.as_ref()).map_err(OnlineSimError::InvalidEndpoint)?;
        Self::builder(api_key).endpoint(url).build()
    }

    /// Create a new client with the default API URL.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Create a builder for configuring the client.
    pub fn builder(api_key: impl Into<String>) -> OnlineSimClientBuilder {
        OnlineSimClientBuilder::new(api_key)
    }

    /// GET `script` with the API key and `query`, decoding the JSON body.
    async fn call<T: DeserializeOwned>(&self, script: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self
            .endpoint
            .join(script)
            .map_err(OnlineSimError::InvalidEndpoint)?;
        url.query_pairs_mut()
            .append_pair("apikey", self.api_key.expose_secret())
            .extend_pairs(query);

        let text = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(OnlineSimError::HttpRequest)?
            .error_for_status()
            .map_err(OnlineSimError::HttpStatus)?
            .text()
            .await
            .map_err(OnlineSimError::ReadResponse)?;

        parse_body(&text)
    }

    /// Get the account balance.
    #[tracing::instrument(name = "OnlineSimClient::get_balance", skip_all)]
    pub async fn get_balance(&self) -> Result<f64> {
        let body: BalanceResponse = self.call("getBalance.php", &[]).await?;
        Ok(body.balance)
    }

    /// Get stock and prices for every country.
    #[tracing::instrument(name = "OnlineSimClient::get_numbers_stats", skip_all)]
    pub async fn get_numbers_stats(&self) -> Result<NumbersStatsResponse> {
        self.call("getNumbersStats.php", &[("country", "all")])
            .await
    }

    /// Buy a number.
    #[tracing::instrument(
        name = "OnlineSimClient::get_num",
        skip_all,
        fields(service = %service, country = %country)
    )]
    pub async fn get_num(&self, service: &str, country: &str) -> Result<GetNumResponse> {
        let body: GetNumResponse = self
            .call(
                "getNum.php",
                &[("service", service), ("country", country), ("number", "true")],
            )
            .await?;

        #[cfg(feature = "otel")]
        Span::current().set_status(Status::Ok);

        Ok(body)
    }

    /// Get the state of one operation.
    #[tracing::instrument(
        name = "OnlineSimClient::get_state",
        skip_all,
        fields(order = %tzid)
    )]
    pub async fn get_state(&self, tzid: &OrderId) -> Result<OperationState> {
        let states: Vec<OperationState> = self
            .call(
                "getState.php",
                &[("tzid", tzid.as_str()), ("message_to_code", "1")],
            )
            .await?;

        states
            .into_iter()
            .find(|s| s.tzid == tzid.as_str())
            .ok_or_else(|| OnlineSimError::UnexpectedResponse(format!("no state for {tzid}")))
    }

    /// Close an operation; `ban` reports the number as unusable.
    #[tracing::instrument(
        name = "OnlineSimClient::set_operation_ok",
        skip_all,
        fields(order = %tzid, ban = ban)
    )]
    pub async fn set_operation_ok(&self, tzid: &OrderId, ban: bool) -> Result<()> {
        let mut query = vec![("tzid", tzid.as_str())];
        if ban {
            query.push(("ban", "1"));
        }
        let _: Ack = self.call("setOperationOk.php", &query).await?;
        Ok(())
    }
}
