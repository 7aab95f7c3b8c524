//! SMS Activate provider implementation.

use super::client::SmsActivateClient;
use super::errors::{SmsActivateError, SmsActivateErrorCode};
use super::types::{ActivationStatus, CountryInfo, PriceEntry};
use crate::order::{Order, OrderSnapshot};
use crate::providers::countries::iso_hint_from_name;
use crate::providers::traits::{ProviderAdapter, ProviderError};
use crate::types::{Balance, Country, OrderId, PhoneNumber, ProviderId, Service};
use async_trait::async_trait;
use chrono::{FixedOffset, Offset, Utc};
use tracing::debug;

/// Default provider id.
pub const PROVIDER_ID: &str = "sms-activate";

/// The vendor reports timestamps in Moscow time.
const VENDOR_UTC_OFFSET_SECS: i32 = 3 * 3600;

/// Vendor service code for a [`Service`].
fn service_code(service: &Service) -> &str {
    match service {
        Service::Whatsapp => "wa",
        Service::Telegram => "tg",
        Service::Other { code } => code,
    }
}

/// SMS Activate provider implementation.
///
/// Wraps the [`SmsActivateClient`] and implements [`ProviderAdapter`],
/// mapping the `STATUS_*`/`ACCESS_*` vocabulary onto the shared lifecycle.
///
/// # Example
///
/// ```rust,ignore
/// use sms_provisioner::providers::sms_activate::{SmsActivateClient, SmsActivateProvider};
/// use sms_provisioner::types::Service;
///
/// let client = SmsActivateClient::with_api_key("your_api_key")?;
/// let provider = SmsActivateProvider::new(client).with_service(Service::Telegram);
/// ```
#[derive(Debug, Clone)]
pub struct SmsActivateProvider {
    id: ProviderId,
    client: SmsActivateClient,
    service: Service,
    currency: String,
    vendor_offset: FixedOffset,
}

impl SmsActivateProvider {
    /// Create a new SMS Activate provider buying WhatsApp numbers.
    pub fn new(client: SmsActivateClient) -> Self {
        Self {
            id: ProviderId::new(PROVIDER_ID),
            client,
            service: Service::default(),
            currency: "RUB".to_string(),
            vendor_offset: FixedOffset::east_opt(VENDOR_UTC_OFFSET_SECS).unwrap_or(Utc.fix()),
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

    /// Set the UTC offset the vendor reports timestamps in.
    pub fn with_vendor_offset(mut self, offset: FixedOffset) -> Self {
        self.vendor_offset = offset;
        self
    }

    /// Get reference to the inner client.
    pub fn client(&self) -> &SmsActivateClient {
        &self.client
    }

    fn to_country(&self, info: &CountryInfo, price: &PriceEntry) -> Country {
        Country {
            provider: self.id.clone(),
            code: info.id.clone(),
            iso_hint: iso_hint_from_name(&info.eng),
            display_name: info.eng.clone(),
            unit_price: price.cost,
            currency: self.currency.clone(),
            available_count: price.count,
            operator: "any".to_string(),
        }
    }

    fn map_purchase_error(&self, error: SmsActivateError, country: &str) -> ProviderError {
        if let SmsActivateError::Service(e) = &error {
            match e.code {
                SmsActivateErrorCode::NoNumbers => {
                    return ProviderError::OutOfStock {
                        provider: self.id.clone(),
                        country: country.to_string(),
                    };
                }
                SmsActivateErrorCode::NoBalance => {
                    return ProviderError::InsufficientFunds {
                        provider: self.id.clone(),
                        reason: e.description.clone(),
                    };
                }
                _ => {}
            }
        }
        ProviderError::from_vendor(&self.id, error)
    }

    fn map_order_error(&self, error: SmsActivateError, order: &OrderId) -> ProviderError {
        if let SmsActivateError::Service(e) = &error
            && matches!(
                e.code,
                SmsActivateErrorCode::NoActivation | SmsActivateErrorCode::WrongActivationId
            )
        {
            return ProviderError::OrderNotFound {
                provider: self.id.clone(),
                order: order.clone(),
            };
        }
        ProviderError::from_vendor(&self.id, error)
    }

    async fn set_status(
        &self,
        order: &OrderId,
        status: ActivationStatus,
    ) -> Result<OrderSnapshot, ProviderError> {
        let response = self
            .client
            .set_activation_status(order, status)
            .await
            .map_err(|e| self.map_order_error(e, order))?;

        debug!(provider = %self.id, order = %order, response = %response, "Activation status set");
        Ok(response.to_snapshot())
    }
}

#[async_trait]
impl ProviderAdapter for SmsActivateProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    #[tracing::instrument(name = "SmsActivateProvider::list_countries", skip_all)]
    async fn list_countries(&self) -> Result<Vec<Country>, ProviderError> {
        let service = service_code(&self.service);
        let (countries, prices) =
            futures::try_join!(self.client.get_countries(), self.client.get_prices(service))
                .map_err(|e| ProviderError::from_vendor(&self.id, e))?;

        let mut catalog: Vec<Country> = countries
            .values()
            .filter(|info| info.is_visible())
            .filter_map(|info| {
                let price = prices.get(&info.id)?.get(service)?;
                Some(self.to_country(info, price))
            })
            .collect();
        catalog.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        debug!(provider = %self.id, countries = catalog.len(), "Catalog fetched");
        Ok(catalog)
    }

    #[tracing::instrument(name = "SmsActivateProvider::get_balance", skip_all)]
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
        name = "SmsActivateProvider::purchase",
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
            .get_phone_number(country_code, service_code(&self.service), operator)
            .await
            .map_err(|e| self.map_purchase_error(e, country_code))?;

        let phone = PhoneNumber::new(&response.phone_number)
            .map_err(|e| ProviderError::rejected(&self.id, e))?;

        let mut order = Order::pending(
            self.id.clone(),
            OrderId::new(response.activation_id.clone()),
            country_code,
            phone,
            response.activation_cost,
        );
        order.operator = operator
            .map(str::to_string)
            .or_else(|| response.activation_operator.clone());
        order.available_at = response.available_at(self.vendor_offset, order.purchased_at);

        debug!(
            provider = %self.id,
            order = %order.id,
            available_at = ?order.available_at,
            "Number purchased"
        );
        Ok(order)
    }

    #[tracing::instrument(
        name = "SmsActivateProvider::check_code",
        skip_all,
        fields(order = %order)
    )]
    async fn check_code(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        let state = self
            .client
            .get_status(order)
            .await
            .map_err(|e| self.map_order_error(e, order))?;

        Ok(state.to_snapshot())
    }

    async fn cancel(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.set_status(order, ActivationStatus::CancelActivation)
            .await
    }

    async fn finish(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.set_status(order, ActivationStatus::FinishActivation)
            .await
    }

    async fn report_abuse(&self, order: &OrderId) -> Result<(), ProviderError> {
        // No dedicated ban action; status 8 reports the number as unusable
        self.set_status(order, ActivationStatus::CancelActivation)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;
    use crate::types::SmsCode;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_provider(mock_server: &MockServer) -> SmsActivateProvider {
        let client = SmsActivateClient::new(mock_server.uri(), "test_key").unwrap();
        SmsActivateProvider::new(client)
    }

    #[tokio::test]
    async fn test_list_countries_joins_catalog_and_prices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("action", "getCountries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "187": {"id": 187, "eng": "USA", "visible": 1},
                "16": {"id": 16, "eng": "United Kingdom", "visible": 1},
                "12": {"id": 12, "eng": "USA (virtual)", "visible": 0}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("action", "getPrices"))
            .and(query_param("service", "wa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "187": {"wa": {"cost": 45.0, "count": 12}},
                "12": {"wa": {"cost": 5.0, "count": 900}}
            })))
            .mount(&mock_server)
            .await;

        let provider = create_test_provider(&mock_server);
        let countries = provider.list_countries().await.unwrap();

        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].code, "187");
        assert_eq!(countries[0].iso_hint.as_deref(), Some("US"));
        assert_eq!(countries[0].available_count, 12);
        assert_eq!(countries[0].provider, ProviderId::new(PROVIDER_ID));
    }

    #[tokio::test]
    async fn test_purchase_creates_pending_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("action", "getNumberV2"))
            .and(query_param("service", "wa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "activationId": 555,
                "phoneNumber": "14155550100",
                "activationCost": 45.0,
                "activationOperator": "tmobile"
            })))
            .mount(&mock_server)
            .await;

        let provider = create_test_provider(&mock_server);
        let order = provider.purchase("187", None).await.unwrap();

        assert_eq!(order.id, OrderId::new("555"));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.phone_number.as_str(), "14155550100");
        assert_eq!(order.operator.as_deref(), Some("tmobile"));
        assert!(order.available_at.is_none());
    }

    #[tokio::test]
    async fn test_purchase_error_mapping() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("country", "187"))
            .respond_with(ResponseTemplate::new(200).set_body_string("NO_NUMBERS"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("country", "16"))
            .respond_with(ResponseTemplate::new(200).set_body_string("NO_BALANCE"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("country", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("BAD_KEY"))
            .mount(&mock_server)
            .await;

        let provider = create_test_provider(&mock_server);
        assert!(matches!(
            provider.purchase("187", None).await,
            Err(ProviderError::OutOfStock { .. })
        ));
        assert!(matches!(
            provider.purchase("16", None).await,
            Err(ProviderError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            provider.purchase("1", None).await,
            Err(ProviderError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_check_code_received() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("action", "getStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_string("STATUS_OK:482913"))
            .mount(&mock_server)
            .await;

        let provider = create_test_provider(&mock_server);
        let snapshot = provider.check_code(&OrderId::new("555")).await.unwrap();

        assert_eq!(snapshot.status, OrderStatus::Received);
        assert_eq!(snapshot.code, Some(SmsCode::new("482913")));
    }

    #[tokio::test]
    async fn test_check_code_transient_error_is_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("action", "getStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ERROR_SQL"))
            .mount(&mock_server)
            .await;

        let provider = create_test_provider(&mock_server);
        assert!(matches!(
            provider.check_code(&OrderId::new("555")).await,
            Err(ProviderError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_activation_is_order_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("action", "setStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_string("NO_ACTIVATION"))
            .mount(&mock_server)
            .await;

        let provider = create_test_provider(&mock_server);
        assert!(matches!(
            provider.cancel(&OrderId::new("404")).await,
            Err(ProviderError::OrderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_finish_and_cancel_snapshots() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("status", "6"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ACCESS_ACTIVATION"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("status", "8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ACCESS_CANCEL"))
            .mount(&mock_server)
            .await;

        let provider = create_test_provider(&mock_server);
        let id = OrderId::new("555");
        assert_eq!(
            provider.finish(&id).await.unwrap().status,
            OrderStatus::Finished
        );
        assert_eq!(
            provider.cancel(&id).await.unwrap().status,
            OrderStatus::Canceled
        );
        provider.report_abuse(&id).await.unwrap();
    }

    #[test]
    fn test_service_codes() {
        assert_eq!(service_code(&Service::Whatsapp), "wa");
        assert_eq!(service_code(&Service::Telegram), "tg");
        assert_eq!(
            service_code(&Service::Other {
                code: "ig".to_string()
            }),
            "ig"
        );
    }
}
