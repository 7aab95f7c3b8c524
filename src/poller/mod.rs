//! Background reconciliation of live orders against their vendors.
//!
//! One poller runs per process. Each tick snapshots the trackable orders,
//! promotes `PENDING` orders whose activation delay has elapsed, and issues
//! one `check_code` per `WAITING` order with bounded concurrency. A failing
//! vendor only costs its own orders a tick.

mod config;

pub use config::{DEFAULT_INTERVAL, DEFAULT_MAX_CONCURRENT_CHECKS, PollerConfig, PollerConfigBuilder};

use crate::order::{OrderSnapshot, OrderStatus, OrderStore, StoreError, reconcile};
use crate::providers::ProviderRegistry;
use crate::types::OrderKey;
use chrono::Utc;
use futures::{StreamExt, stream};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// `PENDING` orders moved to `WAITING`.
    pub promoted: usize,
    /// Vendor checks issued.
    pub checked: usize,
    /// Orders that captured a code.
    pub received: usize,
    /// Orders the vendor reported as terminal.
    pub closed: usize,
    /// Checks that failed and will be retried next tick.
    pub failed: usize,
    /// Orders left alone (still delayed, or changed before their check).
    pub skipped: usize,
}

impl TickReport {
    fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Received => {
                self.checked += 1;
                self.received += 1;
            }
            CheckOutcome::Closed => {
                self.checked += 1;
                self.closed += 1;
            }
            CheckOutcome::Unchanged => self.checked += 1,
            CheckOutcome::Failed => {
                self.checked += 1;
                self.failed += 1;
            }
            CheckOutcome::Skipped => self.skipped += 1,
        }
    }

    fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

#[derive(Debug, Clone, Copy)]
enum CheckOutcome {
    Received,
    Closed,
    Unchanged,
    Failed,
    Skipped,
}

/// Process-wide loop re-checking every non-terminal, code-less order.
///
/// The poller has no per-request caller. It keeps running after whoever
/// started it goes away, until its cancellation token fires.
pub struct ReconciliationPoller {
    store: Arc<dyn OrderStore>,
    registry: Arc<ProviderRegistry>,
    config: PollerConfig,
}

impl ReconciliationPoller {
    /// Create a poller over `store`, checking orders through `registry`.
    pub fn new(
        store: Arc<dyn OrderStore>,
        registry: Arc<ProviderRegistry>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Get reference to the poller configuration.
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Run ticks until `token` is cancelled.
    ///
    /// Cancellation stops new vendor calls; checks already in flight finish
    /// and their results are applied.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.config.interval.as_secs_f64(),
                max_concurrent = self.config.max_concurrent_checks,
                "Reconciliation poller started"
            );

            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = self.tick_until(&token).await;
                        if !report.is_idle() {
                            debug!(?report, "Poll tick complete");
                        }
                    }
                }
            }

            info!("Reconciliation poller stopped");
        })
    }

    /// Run one tick to completion.
    pub async fn tick(&self) -> TickReport {
        self.tick_until(&CancellationToken::new()).await
    }

    #[tracing::instrument(name = "ReconciliationPoller::tick", skip_all)]
    async fn tick_until(&self, token: &CancellationToken) -> TickReport {
        let mut report = TickReport::default();

        let trackable = self.store.list_trackable().await;
        if trackable.is_empty() {
            trace!("No trackable orders");
            return report;
        }

        let now = Utc::now();
        let mut due = Vec::with_capacity(trackable.len());
        for order in trackable {
            match order.status {
                OrderStatus::Waiting => due.push(order.key()),
                OrderStatus::Pending if order.is_available(now) => {
                    let key = order.key();
                    let waiting = OrderSnapshot::status(OrderStatus::Waiting);
                    match reconcile(self.store.as_ref(), &key, &waiting).await {
                        Ok(outcome) => {
                            if outcome.changed {
                                report.promoted += 1;
                            }
                            if outcome.order.status == OrderStatus::Waiting {
                                due.push(key);
                            }
                        }
                        Err(e) => {
                            debug!(order = %key, error = %e, "Promotion skipped");
                            report.skipped += 1;
                        }
                    }
                }
                _ => report.skipped += 1,
            }
        }

        let outcomes: Vec<CheckOutcome> = stream::iter(due)
            .take_until(token.cancelled())
            .map(|key| self.check_one(key))
            .buffer_unordered(self.config.max_concurrent_checks.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    /// Check one order and apply the result.
    async fn check_one(&self, key: OrderKey) -> CheckOutcome {
        // The order may have changed since the tick snapshot
        match self.store.get(&key).await {
            Ok(order) if order.is_trackable() && order.status == OrderStatus::Waiting => {}
            Ok(_) => return CheckOutcome::Skipped,
            Err(e) => {
                warn!(order = %key, error = %e, "Order vanished before check");
                return CheckOutcome::Skipped;
            }
        }

        let snapshot = match self.registry.check_code(&key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(order = %key, error = %e, "Code check failed, retrying next tick");
                return CheckOutcome::Failed;
            }
        };

        match reconcile(self.store.as_ref(), &key, &snapshot).await {
            Ok(outcome) if outcome.changed && outcome.order.verification_code.is_some() => {
                info!(order = %key, status = %outcome.order.status, "Verification code received");
                CheckOutcome::Received
            }
            Ok(outcome) if outcome.order.status.is_terminal() => {
                info!(order = %key, status = %outcome.order.status, "Order closed by vendor");
                CheckOutcome::Closed
            }
            Ok(_) => CheckOutcome::Unchanged,
            // Already marked vendor-closed by reconcile
            Err(StoreError::InvalidTransition { .. }) if snapshot.status.is_terminal() => {
                CheckOutcome::Closed
            }
            Err(e) => {
                warn!(order = %key, error = %e, "Could not apply vendor status");
                CheckOutcome::Failed
            }
        }
    }
}
