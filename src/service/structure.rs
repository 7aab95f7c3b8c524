//! Main service implementation.

use super::config::ProvisionerConfig;
use super::error::ServiceError;
use crate::handoff::{Handoff, HandoffCoordinator, SessionCreator};
use crate::order::{
    Order, OrderClaims, OrderSnapshot, OrderStatus, OrderStore, StoreError, reconcile,
};
use crate::poller::ReconciliationPoller;
use crate::providers::{FanOut, ProviderRegistry};
use crate::proxy::{HealthMonitor, HealthProber, ProxyPool, RegionPreference};
use crate::types::{Balance, Country, OrderKey, ProviderId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// An active order with fields derived for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub order: Order,
    /// Whole minutes until the activation delay ends, rounded up; `None`
    /// once it has passed.
    pub minutes_until_available: Option<i64>,
    /// Waiting for a code longer than the configured bound.
    pub is_stale: bool,
}

impl OrderView {
    fn new(order: Order, now: DateTime<Utc>, stale_after: chrono::Duration) -> Self {
        let minutes_until_available = order
            .available_at
            .filter(|at| *at > now)
            .map(|at| {
                let seconds = (at - now).num_seconds();
                (seconds + 59) / 60
            });

        let waiting_since = order
            .available_at
            .map_or(order.purchased_at, |at| at.max(order.purchased_at));
        let is_stale = order.status == OrderStatus::Waiting && now - waiting_since > stale_after;

        Self {
            order,
            minutes_until_available,
            is_stale,
        }
    }
}

/// Handles to the background tasks started by [`ProvisioningService::start`].
#[derive(Debug)]
pub struct BackgroundTasks {
    pub poller: JoinHandle<()>,
    pub refresh: JoinHandle<()>,
    pub health: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Wait for every task to exit.
    pub async fn join(self) {
        let handles = [
            ("poller", Some(self.poller)),
            ("refresh", Some(self.refresh)),
            ("health", self.health),
        ];
        for (name, handle) in handles {
            if let Some(handle) = handle
                && let Err(e) = handle.await
            {
                error!(task = name, error = %e, "Background task panicked");
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Explicit {
    Cancel,
    Finish,
    ReportAbuse,
}

impl Explicit {
    fn target(self) -> OrderStatus {
        match self {
            Explicit::Cancel => OrderStatus::Canceled,
            Explicit::Finish => OrderStatus::Finished,
            Explicit::ReportAbuse => OrderStatus::Banned,
        }
    }
}

/// Provisioning facade.
///
/// Exposes the operations an administrative surface needs: catalog and
/// balances across providers, purchase, the active order list, manual
/// check/cancel/finish/abuse-report, and session handoff.
///
/// # Example
///
/// ```rust,ignore
/// use sms_provisioner::{ProvisioningService, RegionPreference};
/// use tokio_util::sync::CancellationToken;
///
/// let service = ProvisioningService::builder(registry, store, pool, creator).build();
/// let tasks = service.start(CancellationToken::new());
///
/// let order = service.purchase(&"5sim".into(), "usa", None).await?;
/// // ...the poller captures the code in the background...
/// let handoff = service.handoff(&order.key(), &RegionPreference::Automatic).await?;
/// ```
pub struct ProvisioningService {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn OrderStore>,
    pool: Arc<ProxyPool>,
    poller: Arc<ReconciliationPoller>,
    handoff: HandoffCoordinator,
    claims: Arc<OrderClaims>,
    health: Option<Arc<HealthMonitor>>,
    config: ProvisionerConfig,
}

impl ProvisioningService {
    /// Create a new service.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn OrderStore>,
        pool: Arc<ProxyPool>,
        creator: Arc<dyn SessionCreator>,
        config: ProvisionerConfig,
    ) -> Self {
        Self::builder(registry, store, pool, creator)
            .config(config)
            .build()
    }

    /// Create a new builder for ProvisioningService.
    pub fn builder(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn OrderStore>,
        pool: Arc<ProxyPool>,
        creator: Arc<dyn SessionCreator>,
    ) -> ProvisioningServiceBuilder {
        ProvisioningServiceBuilder {
            registry,
            store,
            pool,
            creator,
            prober: None,
            config: ProvisionerConfig::default(),
        }
    }

    /// Get reference to the provider registry.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Get reference to the order store.
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Get reference to the proxy pool.
    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    /// Get reference to the reconciliation poller.
    pub fn poller(&self) -> &Arc<ReconciliationPoller> {
        &self.poller
    }

    /// Get reference to the service configuration.
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Start the poller, the catalog refresh and, when a prober is
    /// configured, the proxy health monitor. All stop when `token` fires.
    pub fn start(&self, token: CancellationToken) -> BackgroundTasks {
        info!("Starting provisioning background tasks");
        BackgroundTasks {
            poller: Arc::clone(&self.poller).spawn(token.clone()),
            refresh: Arc::clone(&self.registry)
                .spawn_refresh(self.config.catalog_refresh_interval, token.clone()),
            health: self
                .health
                .as_ref()
                .map(|monitor| Arc::clone(monitor).spawn(token)),
        }
    }

    /// Normalized catalog across all providers.
    pub async fn list_countries(&self) -> FanOut<Country> {
        self.registry.list_countries().await
    }

    /// Balances across all providers.
    pub async fn list_balances(&self) -> FanOut<Balance> {
        self.registry.list_balances().await
    }

    /// Buy a number and record the order.
    #[tracing::instrument(
        name = "ProvisioningService::purchase",
        skip_all,
        fields(provider = %provider, country = %country_code)
    )]
    pub async fn purchase(
        &self,
        provider: &ProviderId,
        country_code: &str,
        operator: Option<&str>,
    ) -> Result<Order, ServiceError> {
        let order = self
            .registry
            .purchase(provider, country_code, operator)
            .await?;

        if let Err(e) = self.store.insert(order.clone()).await {
            // The vendor already charged for this number
            error!(order = %order.key(), error = %e, "Purchased order could not be recorded");
            return Err(e.into());
        }
        Ok(order)
    }

    /// Non-terminal orders, oldest first, with derived display fields.
    pub async fn list_active_orders(&self) -> Vec<OrderView> {
        let now = Utc::now();
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .unwrap_or(chrono::Duration::MAX);

        let mut orders = self.store.list_active().await;
        orders.sort_by(|a, b| a.purchased_at.cmp(&b.purchased_at));
        orders
            .into_iter()
            .map(|order| OrderView::new(order, now, stale_after))
            .collect()
    }

    /// Check one order right away.
    ///
    /// An order that already holds a code, or is terminal, is returned as
    /// stored without calling the vendor. Vendor errors are surfaced.
    #[tracing::instrument(name = "ProvisioningService::check_now", skip_all, fields(order = %key))]
    pub async fn check_now(&self, key: &OrderKey) -> Result<Order, ServiceError> {
        let order = self.store.get(key).await?;
        if !order.is_trackable() {
            debug!(status = %order.status, "Nothing to check");
            return Ok(order);
        }

        let snapshot = self.registry.check_code(key).await?;
        Ok(reconcile(self.store.as_ref(), key, &snapshot).await?.order)
    }

    /// Cancel an order; the vendor refunds it.
    pub async fn cancel(&self, key: &OrderKey) -> Result<Order, ServiceError> {
        self.apply_explicit(key, Explicit::Cancel).await
    }

    /// Finish a `RECEIVED` order.
    pub async fn finish(&self, key: &OrderKey) -> Result<Order, ServiceError> {
        self.apply_explicit(key, Explicit::Finish).await
    }

    /// Report the number as abusive and ban the order.
    pub async fn report_abuse(&self, key: &OrderKey) -> Result<Order, ServiceError> {
        self.apply_explicit(key, Explicit::ReportAbuse).await
    }

    /// Hand a `RECEIVED` order off to a new messaging session.
    pub async fn handoff(
        &self,
        key: &OrderKey,
        preference: &RegionPreference,
    ) -> Result<Handoff, ServiceError> {
        Ok(self.handoff.handoff(key, preference).await?)
    }

    /// Validate the lattice edge, call the vendor, then record the move.
    ///
    /// The order is claimed for the whole sequence, so explicit operations
    /// and handoffs on one order run one after another. The edge is checked
    /// before the vendor call so a rejected move never reaches the vendor (a
    /// second cancel is never refunded twice). A vendor failure leaves the
    /// order as it was.
    #[tracing::instrument(name = "ProvisioningService::explicit", skip_all, fields(order = %key, action = ?action))]
    async fn apply_explicit(&self, key: &OrderKey, action: Explicit) -> Result<Order, ServiceError> {
        let target = action.target();
        let _claim = self.claims.claim(key).await;
        let order = self.promote_if_due(key).await?;

        if !order.status.can_transition_to(target) {
            warn!(from = %order.status, to = %target, "Rejected lifecycle transition");
            return Err(StoreError::InvalidTransition {
                key: key.clone(),
                from: order.status,
                to: target,
            }
            .into());
        }

        let vendor_call = match action {
            Explicit::Cancel => self.registry.cancel(key).await.map(drop),
            Explicit::Finish => self.registry.finish(key).await.map(drop),
            Explicit::ReportAbuse => self.registry.report_abuse(key).await,
        };
        if let Err(e) = vendor_call {
            warn!(error = %e, "Vendor refused the operation, order unchanged");
            return Err(e.into());
        }

        let outcome = reconcile(self.store.as_ref(), key, &OrderSnapshot::status(target)).await?;
        if !outcome.changed {
            // The vendor reported the same close to the poller meanwhile
            warn!(status = %outcome.order.status, "Order reached the target before this operation");
            return Err(StoreError::InvalidTransition {
                key: key.clone(),
                from: outcome.order.status,
                to: target,
            }
            .into());
        }
        info!(status = %outcome.order.status, "Order updated");
        Ok(outcome.order)
    }

    /// Move a `PENDING` order whose delay has elapsed to `WAITING`.
    async fn promote_if_due(&self, key: &OrderKey) -> Result<Order, ServiceError> {
        let order = self.store.get(key).await?;
        if order.status != OrderStatus::Pending || !order.is_available(Utc::now()) {
            return Ok(order);
        }
        let waiting = OrderSnapshot::status(OrderStatus::Waiting);
        Ok(reconcile(self.store.as_ref(), key, &waiting).await?.order)
    }
}

/// Builder for ProvisioningService.
pub struct ProvisioningServiceBuilder {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn OrderStore>,
    pool: Arc<ProxyPool>,
    creator: Arc<dyn SessionCreator>,
    prober: Option<Arc<dyn HealthProber>>,
    config: ProvisionerConfig,
}

impl ProvisioningServiceBuilder {
    /// Set the full configuration.
    pub fn config(mut self, config: ProvisionerConfig) -> Self {
        self.config = config;
        self
    }

    /// Probe proxy health in the background with `prober`.
    pub fn health_prober(mut self, prober: Arc<dyn HealthProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Build the ProvisioningService.
    pub fn build(self) -> ProvisioningService {
        let poller = Arc::new(ReconciliationPoller::new(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            self.config.poller.clone(),
        ));
        let claims = Arc::new(OrderClaims::new());
        let handoff =
            HandoffCoordinator::new(Arc::clone(&self.store), Arc::clone(&self.pool), self.creator)
                .with_claims(Arc::clone(&claims));
        let health = self.prober.map(|prober| {
            Arc::new(HealthMonitor::new(
                Arc::clone(&self.pool),
                prober,
                self.config.health.clone(),
            ))
        });

        ProvisioningService {
            registry: self.registry,
            store: self.store,
            pool: self.pool,
            poller,
            handoff,
            claims,
            health,
            config: self.config,
        }
    }
}
