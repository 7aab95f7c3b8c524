//! One-shot handoff of a verified order to a messaging session.
//!
//! A handoff assigns a proxy, asks the external session creator for a
//! session, and marks the order consumed. If session creation fails the
//! proxy slot is returned and the order stays `RECEIVED` and unconsumed, so
//! the handoff can be retried.

mod session;

pub use session::{HttpSessionCreator, SessionCreator, SessionError};

use crate::errors::RetryableError;
use crate::order::{Order, OrderClaims, OrderStatus, OrderStore, StoreError};
use crate::providers::countries::iso_hint_from_phone;
use crate::proxy::{ProxyAssignment, ProxyError, ProxyPool, RegionPreference};
use crate::types::{OrderKey, SessionId};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Result of a successful handoff.
#[derive(Debug, Clone, PartialEq)]
pub struct Handoff {
    /// The order, now consumed.
    pub order: Order,
    /// Session returned by the creator.
    pub session_id: SessionId,
    /// Proxy the session is bound to.
    pub assignment: ProxyAssignment,
}

/// Handoff failures.
#[derive(Debug, Error)]
pub enum HandoffError {
    /// Another handoff or explicit operation on the same order is running.
    #[error("an operation on {0} is already in progress")]
    InProgress(OrderKey),

    /// The order has no code yet, or is in the wrong status.
    #[error("order {key} is not ready for handoff in status {status}")]
    NotConsumable { key: OrderKey, status: OrderStatus },

    /// The order was handed off before.
    #[error("order {0} was already handed off")]
    AlreadyConsumed(OrderKey),

    /// No proxy could be assigned.
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Session creation failed after a proxy was assigned. The assignment
    /// has been rolled back and the order left unconsumed.
    #[error("session creation for {key} failed, proxy assignment rolled back: {source}")]
    PartialFailure {
        key: OrderKey,
        #[source]
        source: SessionError,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for HandoffError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::AlreadyConsumed(key) => HandoffError::AlreadyConsumed(key),
            StoreError::NotConsumable { key, status } => HandoffError::NotConsumable { key, status },
            other => HandoffError::Store(other),
        }
    }
}

impl RetryableError for HandoffError {
    fn is_retryable(&self) -> bool {
        match self {
            HandoffError::PartialFailure { source, .. } => source.is_retryable(),
            HandoffError::Store(e) => e.is_retryable(),
            HandoffError::InProgress(_)
            | HandoffError::NotConsumable { .. }
            | HandoffError::AlreadyConsumed(_)
            | HandoffError::Proxy(_) => false,
        }
    }

    fn should_retry_operation(&self) -> bool {
        match self {
            HandoffError::PartialFailure { .. } => true,
            HandoffError::Proxy(e) => e.should_retry_operation(),
            HandoffError::Store(e) => e.should_retry_operation(),
            HandoffError::InProgress(_)
            | HandoffError::NotConsumable { .. }
            | HandoffError::AlreadyConsumed(_) => false,
        }
    }
}

/// Consumes `RECEIVED` orders exactly once.
///
/// A handoff claims its order for the whole assign, create and consume
/// sequence. Calls finding the order claimed, by another handoff or by an
/// explicit operation sharing the same [`OrderClaims`], are rejected with
/// [`HandoffError::InProgress`]; across processes the store's
/// compare-and-set on `consumed_at` still admits a single winner.
pub struct HandoffCoordinator {
    store: Arc<dyn OrderStore>,
    pool: Arc<ProxyPool>,
    creator: Arc<dyn SessionCreator>,
    claims: Arc<OrderClaims>,
}

impl HandoffCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        pool: Arc<ProxyPool>,
        creator: Arc<dyn SessionCreator>,
    ) -> Self {
        Self {
            store,
            pool,
            creator,
            claims: Arc::new(OrderClaims::new()),
        }
    }

    /// Share order claims with other operations on the same store.
    pub fn with_claims(mut self, claims: Arc<OrderClaims>) -> Self {
        self.claims = claims;
        self
    }

    /// Hand `key` off to a new messaging session.
    #[tracing::instrument(name = "HandoffCoordinator::handoff", skip_all, fields(order = %key))]
    pub async fn handoff(
        &self,
        key: &OrderKey,
        preference: &RegionPreference,
    ) -> Result<Handoff, HandoffError> {
        let _claim = self
            .claims
            .try_claim(key)
            .ok_or_else(|| HandoffError::InProgress(key.clone()))?;

        let order = self.store.get(key).await?;
        if order.consumed_at.is_some() {
            return Err(HandoffError::AlreadyConsumed(key.clone()));
        }
        if !order.is_consumable() {
            return Err(HandoffError::NotConsumable {
                key: key.clone(),
                status: order.status,
            });
        }

        // Catalog names do not always resolve; the number itself always has a country
        let iso_hint = order
            .iso_hint
            .clone()
            .or_else(|| iso_hint_from_phone(&order.phone_number));
        let assignment = self
            .pool
            .assign(key, preference, iso_hint.as_deref())
            .await?;

        let session_id = match self
            .creator
            .create_session(&order.phone_number, &assignment.proxy_id)
            .await
        {
            Ok(session_id) => session_id,
            Err(source) => {
                self.rollback(key).await;
                warn!(error = %source, proxy = %assignment.proxy_id, "Session creation failed, assignment rolled back");
                return Err(HandoffError::PartialFailure {
                    key: key.clone(),
                    source,
                });
            }
        };

        let order = match self.store.mark_consumed(key, Utc::now()).await {
            Ok(order) => order,
            Err(e) => {
                self.rollback(key).await;
                warn!(session = %session_id, error = %e, "Order could not be consumed after session creation");
                return Err(e.into());
            }
        };

        info!(
            session = %session_id,
            proxy = %assignment.proxy_id,
            reason = %assignment.reason,
            "Order handed off"
        );
        Ok(Handoff {
            order,
            session_id,
            assignment,
        })
    }

    async fn rollback(&self, key: &OrderKey) {
        if let Err(e) = self.pool.release(key).await {
            warn!(order = %key, error = %e, "Proxy rollback failed");
        }
    }
}
