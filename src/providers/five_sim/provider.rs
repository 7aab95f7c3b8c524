//! 5sim provider implementation.

use super::client::{FiveSimClient, OrderAction};
use super::errors::{FiveSimError, FiveSimErrorCode};
use super::types::{OrderResponse, aggregate_operators};
use crate::order::{Order, OrderSnapshot};
use crate::providers::countries::iso_hint_from_name;
use crate::providers::traits::{ProviderAdapter, ProviderError};
use crate::types::{Balance, Country, OrderId, PhoneNumber, ProviderId, Service};
use async_trait::async_trait;
use tracing::debug;

/// Default provider id.
pub const PROVIDER_ID: &str = "5sim";

/// Operator wildcard accepted by the buy endpoint.
const ANY_OPERATOR: &str = "any";

/// 5sim product name for a [`Service`].
fn product_name(service: &Service) -> &str {
    match service {
        Service::Whatsapp => "whatsapp",
        Service::Telegram => "telegram",
        Service::Other { code } => code,
    }
}

/// 5sim provider implementation.
#[derive(Debug, Clone)]
pub struct FiveSimProvider {
    id: ProviderId,
    client: FiveSimClient,
    service: Service,
    currency: String,
}

impl FiveSimProvider {
    /// Create a new 5sim provider buying WhatsApp numbers.
    pub fn new(client: FiveSimClient) -> Self {
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
    pub fn client(&self) -> &FiveSimClient {
        &self.client
    }

    fn map_error(&self, error: FiveSimError, country: &str, order: Option<&OrderId>) -> ProviderError {
        match (&error, order) {
            (FiveSimError::Service(FiveSimErrorCode::NoFreePhones), _) => ProviderError::OutOfStock {
                provider: self.id.clone(),
                country: country.to_string(),
            },
            (FiveSimError::Service(FiveSimErrorCode::NotEnoughBalance), _) => {
                ProviderError::InsufficientFunds {
                    provider: self.id.clone(),
                    reason: error.to_string(),
                }
            }
            (FiveSimError::Service(FiveSimErrorCode::OrderNotFound), Some(order)) => {
                ProviderError::OrderNotFound {
                    provider: self.id.clone(),
                    order: order.clone(),
                }
            }
            _ => ProviderError::from_vendor(&self.id, error),
        }
    }

    async fn order_action(
        &self,
        action: OrderAction,
        order: &OrderId,
    ) -> Result<OrderResponse, ProviderError> {
        self.client
            .order_action(action, order)
            .await
            .map_err(|e| self.map_error(e, "", Some(order)))
    }

    fn snapshot(&self, response: &OrderResponse) -> Result<OrderSnapshot, ProviderError> {
        response
            .to_snapshot()
            .map_err(|e| ProviderError::rejected(&self.id, e))
    }
}

#[async_trait]
impl ProviderAdapter for FiveSimProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    #[tracing::instrument(name = "FiveSimProvider::list_countries", skip_all)]
    async fn list_countries(&self) -> Result<Vec<Country>, ProviderError> {
        let product = product_name(&self.service);
        let prices = self
            .client
            .get_prices(product)
            .await
            .map_err(|e| ProviderError::from_vendor(&self.id, e))?;

        let mut catalog: Vec<Country> = prices
            .iter()
            .filter_map(|(name, products)| {
                let offer = aggregate_operators(products.get(product)?)?;
                Some(Country {
                    provider: self.id.clone(),
                    code: name.clone(),
                    iso_hint: iso_hint_from_name(name),
                    display_name: name.clone(),
                    unit_price: offer.cost,
                    currency: self.currency.clone(),
                    available_count: offer.count,
                    operator: ANY_OPERATOR.to_string(),
                })
            })
            .collect();
        catalog.sort_by(|a, b| a.code.cmp(&b.code));

        debug!(provider = %self.id, countries = catalog.len(), "Catalog fetched");
        Ok(catalog)
    }

    #[tracing::instrument(name = "FiveSimProvider::get_balance", skip_all)]
    async fn get_balance(&self) -> Result<Balance, ProviderError> {
        let profile = self
            .client
            .get_profile()
            .await
            .map_err(|e| ProviderError::from_vendor(&self.id, e))?;

        Ok(Balance {
            provider: self.id.clone(),
            amount: profile.balance,
            currency: self.currency.clone(),
        })
    }

    #[tracing::instrument(
        name = "FiveSimProvider::purchase",
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
            .buy_activation(
                country_code,
                operator.unwrap_or(ANY_OPERATOR),
                product_name(&self.service),
            )
            .await
            .map_err(|e| self.map_error(e, country_code, None))?;

        let phone =
            PhoneNumber::new(&response.phone).map_err(|e| ProviderError::rejected(&self.id, e))?;

        let mut order = Order::pending(
            self.id.clone(),
            OrderId::from(response.id),
            country_code,
            phone,
            response.price,
        );
        order.operator = response
            .operator
            .clone()
            .or_else(|| operator.map(str::to_string));

        debug!(provider = %self.id, order = %order.id, "Number purchased");
        Ok(order)
    }

    #[tracing::instrument(
        name = "FiveSimProvider::check_code",
        skip_all,
        fields(order = %order)
    )]
    async fn check_code(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        let response = self.order_action(OrderAction::Check, order).await?;
        self.snapshot(&response)
    }

    async fn cancel(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        let response = self.order_action(OrderAction::Cancel, order).await?;
        self.snapshot(&response)
    }

    async fn finish(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        let response = self.order_action(OrderAction::Finish, order).await?;
        self.snapshot(&response)
    }

    async fn report_abuse(&self, order: &OrderId) -> Result<(), ProviderError> {
        self.order_action(OrderAction::Ban, order).await?;
        debug!(provider = %self.id, order = %order, "Number reported");
        Ok(())
    }
}
