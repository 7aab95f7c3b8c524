//! SMS Activate HTTP client.

use super::errors::{Result, SmsActivateError};
use super::response::{SmsActivateResponse, SmsActivateTextResponse};
use super::types::{
    ActivationState, ActivationStatus, CountriesResponse, GetPhoneNumberResponse, PricesResponse,
    SetStatusResponse, parse_balance,
};
use crate::types::OrderId;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use url::Url;

#[cfg(feature = "otel")]
use opentelemetry::trace::Status;
#[cfg(feature = "otel")]
use tracing::Span;
#[cfg(feature = "otel")]
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Default SMS Activate API URL.
pub const DEFAULT_API_URL: &str = "https://api.sms-activate.org/stubs/handler_api.php";

/// SMS Activate HTTP client.
///
/// Speaks the `handler_api.php?action=` protocol. Errors arrive as plain
/// text codes, successful calls as either text (`ACCESS_*`, `STATUS_*`) or
/// JSON depending on the action.
///
/// # Example
///
/// ```rust,ignore
/// use sms_provisioner::providers::sms_activate::SmsActivateClient;
///
/// let client = SmsActivateClient::with_api_key("your_api_key")?;
/// let balance = client.get_balance().await?;
/// let number = client.get_phone_number("187", "wa", None).await?;
/// ```
#[derive(Clone)]
pub struct SmsActivateClient {
    http_client: ClientWithMiddleware,
    api_key: SecretString,
    endpoint: Url,
}

impl std::fmt::Debug for SmsActivateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsActivateClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Builder for configuring a [`SmsActivateClient`].
pub struct SmsActivateClientBuilder {
    api_key: String,
    endpoint: Option<Url>,
    http_client: Option<ClientWithMiddleware>,
}

impl SmsActivateClientBuilder {
    /// Create a new builder with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: None,
            http_client: None,
        }
    }

    /// Set a custom API endpoint.
    pub fn endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set a custom HTTP client with middleware.
    pub fn http_client(mut self, client: ClientWithMiddleware) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the [`SmsActivateClient`].
    pub fn build(self) -> Result<SmsActivateClient> {
        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => Url::parse(DEFAULT_API_URL).map_err(SmsActivateError::InvalidEndpoint)?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let client = reqwest::Client::builder()
                    .build()
                    .map_err(SmsActivateError::BuildHttpClient)?;
                ClientBuilder::new(client).build()
            }
        };

        Ok(SmsActivateClient {
            http_client,
            api_key: SecretString::from(self.api_key),
            endpoint,
        })
    }
}

impl SmsActivateClient {
    /// Create a new SMS Activate client against `endpoint`.
    pub fn new(endpoint: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self> {
        let url = Url::parse(endpoint.as_ref()).map_err(SmsActivateError::InvalidEndpoint)?;
        Self::builder(api_key).endpoint(url).build()
    }

    /// Create a new client with the default API URL.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Create a builder for configuring the client.
    pub fn builder(api_key: impl Into<String>) -> SmsActivateClientBuilder {
        SmsActivateClientBuilder::new(api_key)
    }

    /// Build request URL with action and parameters.
    fn build_request_url(&self, action: &str, additional: Vec<(&str, String)>) -> Result<Url> {
        let mut endpoint = self.endpoint.clone();

        let mut params = HashMap::new();
        params.insert("api_key", self.api_key.expose_secret().to_string());
        params.insert("action", action.to_string());

        for (key, value) in additional {
            params.insert(key, value);
        }

        endpoint.set_query(Some(
            &serde_urlencoded::to_string(&params).map_err(SmsActivateError::BuildRequestUrl)?,
        ));

        Ok(endpoint)
    }

    /// Send a GET request and return the response text.
    async fn send_request(&self, url: Url) -> Result<String> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(SmsActivateError::HttpRequest)?
            .error_for_status()
            .map_err(SmsActivateError::HttpStatus)?;

        response
            .text()
            .await
            .map_err(SmsActivateError::ParseResponse)
    }

    /// Call an action answering with JSON.
    async fn call_json<T: DeserializeOwned>(
        &self,
        action: &str,
        additional: Vec<(&str, String)>,
    ) -> Result<T> {
        let url = self.build_request_url(action, additional)?;
        let text = self.send_request(url).await?;

        SmsActivateResponse::<T>::from_text(&text)
            .map_err(SmsActivateError::DeserializeJson)?
            .into_result()
            .map_err(SmsActivateError::Service)
    }

    /// Call an action answering with plain text.
    async fn call_text(&self, action: &str, additional: Vec<(&str, String)>) -> Result<String> {
        let url = self.build_request_url(action, additional)?;
        let text = self.send_request(url).await?;

        SmsActivateTextResponse::from_text(&text)
            .into_result()
            .map_err(SmsActivateError::Service)
    }

    /// Get the account balance.
    #[tracing::instrument(name = "SmsActivateClient::get_balance", skip_all)]
    pub async fn get_balance(&self) -> Result<f64> {
        let raw = self.call_text("getBalance", vec![]).await?;
        parse_balance(&raw).ok_or(SmsActivateError::UnexpectedResponse { raw })
    }

    /// Get the country catalog.
    #[tracing::instrument(name = "SmsActivateClient::get_countries", skip_all)]
    pub async fn get_countries(&self) -> Result<CountriesResponse> {
        self.call_json("getCountries", vec![]).await
    }

    /// Get prices and stock for one service across all countries.
    #[tracing::instrument(
        name = "SmsActivateClient::get_prices",
        skip_all,
        fields(service = %service)
    )]
    pub async fn get_prices(&self, service: &str) -> Result<PricesResponse> {
        self.call_json("getPrices", vec![("service", service.to_string())])
            .await
    }

    /// Buy a phone number.
    ///
    /// # Arguments
    /// * `country_id` - Vendor numeric country id
    /// * `service` - Vendor service code (e.g. `wa`)
    /// * `operator` - Optional operator restriction
    #[tracing::instrument(
        name = "SmsActivateClient::get_phone_number",
        skip_all,
        fields(service = %service, country = %country_id)
    )]
    pub async fn get_phone_number(
        &self,
        country_id: &str,
        service: &str,
        operator: Option<&str>,
    ) -> Result<GetPhoneNumberResponse> {
        let mut params = vec![
            ("service", service.to_string()),
            ("country", country_id.to_string()),
        ];
        if let Some(operator) = operator {
            params.push(("operator", operator.to_string()));
        }

        let data: GetPhoneNumberResponse = self.call_json("getNumberV2", params).await?;

        #[cfg(feature = "otel")]
        Span::current().set_status(Status::Ok);

        Ok(data)
    }

    /// Get the activation state.
    #[tracing::instrument(
        name = "SmsActivateClient::get_status",
        skip_all,
        fields(order = %id)
    )]
    pub async fn get_status(&self, id: &OrderId) -> Result<ActivationState> {
        let raw = self
            .call_text("getStatus", vec![("id", id.to_string())])
            .await?;

        ActivationState::from_raw(&raw).ok_or(SmsActivateError::UnexpectedResponse { raw })
    }

    /// Set activation status.
    #[tracing::instrument(
        name = "SmsActivateClient::set_activation_status",
        skip_all,
        fields(order = %id, status = %status)
    )]
    pub async fn set_activation_status(
        &self,
        id: &OrderId,
        status: ActivationStatus,
    ) -> Result<SetStatusResponse> {
        let raw = self
            .call_text(
                "setStatus",
                vec![
                    ("id", id.to_string()),
                    ("status", status.code().to_string()),
                ],
            )
            .await?;

        let result =
            SetStatusResponse::from_raw(&raw).ok_or(SmsActivateError::UnexpectedResponse { raw })?;

        #[cfg(feature = "otel")]
        Span::current().set_status(Status::Ok);

        Ok(result)
    }
}
