//! OnlineSim provider implementation.

use super::client::OnlineSimClient;
use super::errors::{OnlineSimError, OnlineSimErrorCode};
use crate::order::{Order, OrderSnapshot, OrderStatus};
use crate::providers::countries::iso_hint_from_name;
use crate::providers::traits::{ProviderAdapter, ProviderError};
use crate::types::{Balance, Country, OrderId, PhoneNumber, ProviderId, Service};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Default provider id.
pub const PROVIDER_ID: &str = "onlinesim";

/// OnlineSim service slug for a [`Service`].
fn service_slug(service: &Service) -> &str {
    match service {
        Service::Whatsapp => "whatsapp",
        Service::Telegram => "telegram",
        Service::Other { code } => code,
    }
}

/// OnlineSim provider implementation.
///
/// Countries are addressed by dial code (`"1"`, `"44"`). The buy call does
/// not report a price, so the order is priced from the operation state.
#[derive(Debug, Clone)]
pub struct OnlineSimProvider {
    id: ProviderId,
    client: OnlineSimClient,
    service: Service,
    currency: String,
}

impl OnlineSimProvider {
    /// Create a new OnlineSim provider buying WhatsApp numbers.
    pub fn new(client: OnlineSimClient) -> Self {
        Self {
            id: ProviderId::new(PROVIDER_ID),
            client,
            service: Service::default(),
            currency: "RUB".to_string(),
        }
    }

    /// Override the provider id recorded on orders.
    pub fn with_id(mut self, id: impl Into<ProviderId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the service numbers are bought for.
    pub fn with_service(mut self, service: Service) -> Self {
        self.service = service;
        self
    }

    /// Set the account currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Get reference to the inner client.
    pub fn client(&self) -> &OnlineSimClient {
        &self.client
    }

    fn map_error(&self, error: OnlineSimError, country: &str, order: Option<&OrderId>) -> ProviderError {
        match (&error, order) {
            (OnlineSimError::Service(OnlineSimErrorCode::NoNumber), _) => {
                ProviderError::OutOfStock {
                    provider: self.id.clone(),
                    country: country.to_string(),
                }
            }
            (OnlineSimError::Service(OnlineSimErrorCode::WarningLowBalance), _) => {
                ProviderError::InsufficientFunds {
                    provider: self.id.clone(),
                    reason: error.to_string(),
                }
            }
            (
                OnlineSimError::Service(
                    OnlineSimErrorCode::ErrorNoOperations | OnlineSimErrorCode::ErrorWrongTzid,
                ),
                Some(order),
            ) => ProviderError::OrderNotFound {
                provider: self.id.clone(),
                order: order.clone(),
            },
            _ => ProviderError::from_vendor(&self.id, error),
        }
    }

    async fn close(&self, order: &OrderId, ban: bool) -> Result<(), ProviderError> {
        self.client
            .set_operation_ok(order, ban)
            .await
            .map_err(|e| self.map_error(e, "", Some(order)))
    }
}

#[async_trait]
impl ProviderAdapter for OnlineSimProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    #[tracing::instrument(name = "OnlineSimProvider::list_countries", skip_all)]
    async fn list_countries(&self) -> Result<Vec<Country>, ProviderError> {
        let slug = service_slug(&self.service);
        let stats = self
            .client
            .get_numbers_stats()
            .await
            .map_err(|e| ProviderError::from_vendor(&self.id, e))?;

        let mut catalog: Vec<Country> = stats
            .iter()
            .filter(|(_, country)| country.enabled)
            .filter_map(|(code, country)| {
                let offer = country.service(slug)?;
                Some(Country {
                    provider: self.id.clone(),
                    code: code.clone(),
                    iso_hint: iso_hint_from_name(&country.name),
                    display_name: country.name.clone(),
                    unit_price: offer.price,
                    currency: self.currency.clone(),
                    available_count: offer.count,
                    operator: "any".to_string(),
                })
            })
            .collect();
        catalog.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        debug!(provider = %self.id, countries = catalog.len(), "Catalog fetched");
        Ok(catalog)
    }

    #[tracing::instrument(name = "OnlineSimProvider::get_balance", skip_all)]
    async fn get_balance(&self) -> Result<Balance, ProviderError> {
        let amount = self
            .client
            .get_balance()
            .await
            .map_err(|e| ProviderError::from_vendor(&self.id, e))?;

        Ok(Balance {
            provider: self.id.clone(),
            amount,
            currency: self.currency.clone(),
        })
    }

    #[tracing::instrument(
        name = "OnlineSimProvider::purchase",
        skip_all,
        fields(country = %country_code)
    )]
    async fn purchase(
        &self,
        country_code: &str,
        operator: Option<&str>,
    ) -> Result<Order, ProviderError> {
        let response = self
            .client
            .get_num(service_slug(&self.service), country_code)
            .await
            .map_err(|e| self.map_error(e, country_code, None))?;

        let phone =
            PhoneNumber::new(&response.number).map_err(|e| ProviderError::rejected(&self.id, e))?;
        let id = OrderId::new(response.tzid);

        // The number is bought at this point; a failed price lookup must not lose it
        let price = match self.client.get_state(&id).await {
            Ok(state) => state.sum.unwrap_or_default(),
            Err(e) => {
                warn!(provider = %self.id, order = %id, error = %e, "Could not read operation price");
                0.0
            }
        };

        let mut order = Order::pending(self.id.clone(), id, country_code, phone, price);
        order.operator = operator.map(str::to_string);

        debug!(provider = %self.id, order = %order.id, "Number purchased");
        Ok(order)
    }

    #[tracing::instrument(
        name = "OnlineSimProvider::check_code",
        skip_all,
        fields(order = %order)
    )]
    async fn check_code(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        let state = self
            .client
            .get_state(order)
            .await
            .map_err(|e| self.map_error(e, "", Some(order)))?;

        state
            .to_snapshot()
            .map_err(|e| ProviderError::rejected(&self.id, e))
    }

    async fn cancel(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.close(order, false).await?;
        Ok(OrderSnapshot::status(OrderStatus::Canceled))
    }

    async fn finish(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.close(order, false).await?;
        Ok(OrderSnapshot::status(OrderStatus::Finished))
    }

    async fn report_abuse(&self, order: &OrderId) -> Result<(), ProviderError> {
        self.close(order, true).await
    }
}
