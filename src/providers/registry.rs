//! Provider registry: one interface over every registered adapter.

use super::traits::{ProviderAdapter, ProviderError};
use crate::order::{Order, OrderSnapshot};
use crate::types::{Balance, Country, OrderKey, ProviderId};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Merged result of a call fanned out to every provider.
///
/// One unavailable vendor never hides the others; its error lands in
/// `failures` while the rest are returned in `items`.
#[derive(Debug)]
pub struct FanOut<T> {
    /// Results from providers that answered.
    pub items: Vec<T>,
    /// One error per provider that failed.
    pub failures: Vec<ProviderError>,
}

impl<T> FanOut<T> {
    /// Whether every provider answered.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<T> Default for FanOut<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Registry of provider adapters keyed by [`ProviderId`].
///
/// Keeps the last catalog and balance seen from each provider. The cached
/// catalog gates purchases on stock; balances are always re-read before a
/// purchase so an overdraw fails before anything is bought.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderId, Arc<dyn ProviderAdapter>>>,
    catalog: RwLock<HashMap<ProviderId, Vec<Country>>>,
    balances: RwLock<HashMap<ProviderId, Balance>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter while building the registry.
    pub fn with_provider(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let id = adapter.id().clone();
        self.providers.get_mut().insert(id, adapter);
        self
    }

    /// Register an adapter, replacing any adapter with the same id.
    pub async fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        let id = adapter.id().clone();
        debug!(provider = %id, "Registering provider");
        self.providers.write().await.insert(id, adapter);
    }

    /// Remove an adapter and its cached data.
    pub async fn unregister(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.catalog.write().await.remove(id);
        self.balances.write().await.remove(id);
        self.providers.write().await.remove(id)
    }

    /// Adapter registered under `id`.
    pub async fn get(&self, id: &ProviderId) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.providers
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(id.clone()))
    }

    /// Registered provider ids, sorted.
    pub async fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.providers.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Adapters sorted by id; the lock is released before any vendor call.
    async fn adapters(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        let mut adapters: Vec<_> = self.providers.read().await.values().cloned().collect();
        adapters.sort_by(|a, b| a.id().cmp(b.id()));
        adapters
    }

    /// Fetch every provider's catalog concurrently and refresh the cache.
    #[tracing::instrument(name = "ProviderRegistry::list_countries", skip_all)]
    pub async fn list_countries(&self) -> FanOut<Country> {
        let adapters = self.adapters().await;
        let results = join_all(adapters.iter().map(|adapter| async move {
            (adapter.id().clone(), adapter.list_countries().await)
        }))
        .await;

        let mut out = FanOut::default();
        let mut catalog = self.catalog.write().await;
        for (id, result) in results {
            match result {
                Ok(countries) => {
                    out.items.extend(countries.iter().cloned());
                    catalog.insert(id, countries);
                }
                Err(e) => {
                    warn!(provider = %id, error = %e, "Catalog refresh failed");
                    out.failures.push(e);
                }
            }
        }
        out
    }

    /// Fetch every provider's balance concurrently and refresh the cache.
    #[tracing::instrument(name = "ProviderRegistry::list_balances", skip_all)]
    pub async fn list_balances(&self) -> FanOut<Balance> {
        let adapters = self.adapters().await;
        let results = join_all(adapters.iter().map(|adapter| async move {
            (adapter.id().clone(), adapter.get_balance().await)
        }))
        .await;

        let mut out = FanOut::default();
        let mut balances = self.balances.write().await;
        for (id, result) in results {
            match result {
                Ok(balance) => {
                    balances.insert(id, balance.clone());
                    out.items.push(balance);
                }
                Err(e) => {
                    warn!(provider = %id, error = %e, "Balance refresh failed");
                    out.failures.push(e);
                }
            }
        }
        out
    }

    /// Last catalog seen from every provider.
    pub async fn cached_countries(&self) -> Vec<Country> {
        let catalog = self.catalog.read().await;
        let mut ids: Vec<_> = catalog.keys().collect();
        ids.sort();
        ids.into_iter()
            .flat_map(|id| catalog[id].iter().cloned())
            .collect()
    }

    /// Last balance seen from `provider`.
    pub async fn cached_balance(&self, provider: &ProviderId) -> Option<Balance> {
        self.balances.read().await.get(provider).cloned()
    }

    /// Catalog entry for `(provider, country_code)`, loading the provider's
    /// catalog on a cold cache.
    async fn offer(
        &self,
        adapter: &dyn ProviderAdapter,
        country_code: &str,
    ) -> Result<Option<Country>, ProviderError> {
        let id = adapter.id();
        if let Some(countries) = self.catalog.read().await.get(id) {
            return Ok(countries.iter().find(|c| c.code == country_code).cloned());
        }

        let countries = adapter.list_countries().await?;
        let offer = countries.iter().find(|c| c.code == country_code).cloned();
        self.catalog.write().await.insert(id.clone(), countries);
        Ok(offer)
    }

    /// Buy a number from `provider`.
    ///
    /// Fails with [`ProviderError::OutOfStock`] when the catalog shows no
    /// stock and with [`ProviderError::InsufficientFunds`] when the fresh
    /// balance cannot cover the catalog price. Either way nothing is bought.
    #[tracing::instrument(
        name = "ProviderRegistry::purchase",
        skip_all,
        fields(provider = %provider, country = %country_code)
    )]
    pub async fn purchase(
        &self,
        provider: &ProviderId,
        country_code: &str,
        operator: Option<&str>,
    ) -> Result<Order, ProviderError> {
        let adapter = self.get(provider).await?;

        let offer = self
            .offer(adapter.as_ref(), country_code)
            .await?
            .filter(Country::is_orderable)
            .ok_or_else(|| ProviderError::OutOfStock {
                provider: provider.clone(),
                country: country_code.to_string(),
            })?;

        let balance = adapter.get_balance().await?;
        self.balances
            .write()
            .await
            .insert(provider.clone(), balance.clone());
        if !balance.can_afford(offer.unit_price) {
            return Err(ProviderError::InsufficientFunds {
                provider: provider.clone(),
                reason: format!(
                    "balance {:.2} {} is below price {:.2} {}",
                    balance.amount, balance.currency, offer.unit_price, offer.currency
                ),
            });
        }

        let mut order = adapter.purchase(country_code, operator).await?;
        if order.iso_hint.is_none() {
            order.iso_hint = offer.iso_hint.clone();
        }
        if order.price <= 0.0 {
            order.price = offer.unit_price;
        }

        self.record_purchase(provider, country_code, order.price)
            .await;

        info!(
            provider = %provider,
            order = %order.id,
            country = %country_code,
            price = order.price,
            "Number purchased"
        );
        Ok(order)
    }

    /// Reflect a purchase in the cached stock and balance until the next
    /// refresh.
    async fn record_purchase(&self, provider: &ProviderId, country_code: &str, price: f64) {
        if let Some(country) = self
            .catalog
            .write()
            .await
            .get_mut(provider)
            .and_then(|countries| countries.iter_mut().find(|c| c.code == country_code))
        {
            country.available_count = country.available_count.saturating_sub(1);
        }
        if let Some(balance) = self.balances.write().await.get_mut(provider) {
            balance.amount -= price;
        }
    }

    /// Route a code check to the order's provider.
    pub async fn check_code(&self, key: &OrderKey) -> Result<OrderSnapshot, ProviderError> {
        self.get(&key.provider).await?.check_code(&key.id).await
    }

    /// Route a cancel to the order's provider.
    pub async fn cancel(&self, key: &OrderKey) -> Result<OrderSnapshot, ProviderError> {
        self.get(&key.provider).await?.cancel(&key.id).await
    }

    /// Route a finish to the order's provider.
    pub async fn finish(&self, key: &OrderKey) -> Result<OrderSnapshot, ProviderError> {
        self.get(&key.provider).await?.finish(&key.id).await
    }

    /// Route an abuse report to the order's provider.
    pub async fn report_abuse(&self, key: &OrderKey) -> Result<(), ProviderError> {
        self.get(&key.provider).await?.report_abuse(&key.id).await
    }

    /// Refresh catalogs and balances.
    pub async fn refresh(&self) {
        let (countries, balances) = futures::join!(self.list_countries(), self.list_balances());
        debug!(
            countries = countries.items.len(),
            balances = balances.items.len(),
            failures = countries.failures.len() + balances.failures.len(),
            "Provider caches refreshed"
        );
    }

    /// Keep catalogs and balances warm until `token` is cancelled.
    pub fn spawn_refresh(
        self: Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Provider refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => self.refresh().await,
                }
            }
        })
    }
}
