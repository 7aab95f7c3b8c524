//! Durable record of purchased numbers.

use super::{Order, OrderStatus, TransitionError};
use crate::errors::RetryableError;
use crate::types::{OrderKey, SmsCode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Snapshot file schema version.
const SNAPSHOT_VERSION: u32 = 1;

/// Errors returned by an [`OrderStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order with this key.
    #[error("order {0} not found")]
    NotFound(OrderKey),

    /// An order with this key already exists.
    #[error("order {0} already exists")]
    Duplicate(OrderKey),

    /// Compare-and-set lost: the order is no longer in the expected status.
    #[error("order {key} is {actual}, expected {expected}")]
    Conflict {
        key: OrderKey,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The move is not an edge of the lifecycle lattice.
    #[error("order {key}: invalid transition {from} -> {to}")]
    InvalidTransition {
        key: OrderKey,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// `RECEIVED` requested without a code.
    #[error("order {0}: RECEIVED requires a verification code")]
    MissingCode(OrderKey),

    /// The order cannot be consumed (no code, wrong status).
    #[error("order {key} is not consumable in status {status}")]
    NotConsumable { key: OrderKey, status: OrderStatus },

    /// `consumed_at` is already set.
    #[error("order {0} was already consumed")]
    AlreadyConsumed(OrderKey),

    /// Snapshot file could not be read or written.
    #[error("order snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file could not be encoded or decoded.
    #[error("order snapshot is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    fn from_transition(key: &OrderKey, err: TransitionError) -> Self {
        match err {
            TransitionError::Invalid { from, to } => StoreError::InvalidTransition {
                key: key.clone(),
                from,
                to,
            },
            TransitionError::MissingCode => StoreError::MissingCode(key.clone()),
        }
    }
}

impl RetryableError for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Io(_))
    }
}

/// Persistence seam for orders.
///
/// Writes to one order are serialized by the implementation; writes to
/// different orders must not block each other.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Record a newly purchased order.
    async fn insert(&self, order: Order) -> Result<(), StoreError>;

    /// Fetch one order.
    async fn get(&self, key: &OrderKey) -> Result<Order, StoreError>;

    /// All orders, terminal ones included.
    async fn list(&self) -> Vec<Order>;

    /// Non-terminal orders.
    async fn list_active(&self) -> Vec<Order> {
        self.list()
            .await
            .into_iter()
            .filter(|o| !o.status.is_terminal())
            .collect()
    }

    /// Non-terminal orders without a code.
    async fn list_trackable(&self) -> Vec<Order> {
        self.list()
            .await
            .into_iter()
            .filter(Order::is_trackable)
            .collect()
    }

    /// Compare-and-set on the status field.
    ///
    /// Succeeds only when the order is currently `from` and `from -> to` is
    /// a lattice edge. `code` is required when `to` is `RECEIVED`.
    async fn transition(
        &self,
        key: &OrderKey,
        from: OrderStatus,
        to: OrderStatus,
        code: Option<SmsCode>,
    ) -> Result<Order, StoreError>;

    /// Set `consumed_at` once, on a `RECEIVED` order holding a code.
    async fn mark_consumed(&self, key: &OrderKey, at: DateTime<Utc>)
    -> Result<Order, StoreError>;

    /// Record that the vendor closed a non-terminal order with `status`,
    /// which has no lattice path from the stored status. The stored status
    /// is left as is; the order just stops being trackable.
    async fn mark_vendor_closed(
        &self,
        key: &OrderKey,
        status: OrderStatus,
    ) -> Result<Order, StoreError>;
}

/// In-memory [`OrderStore`] with per-order locking and JSON snapshots.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderKey, Arc<Mutex<Order>>>>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    orders: Vec<Order>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &OrderKey) -> Result<Arc<Mutex<Order>>, StoreError> {
        self.orders
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    /// Write all orders to `path` as JSON.
    ///
    /// The file is written next to `path` first and renamed into place, so
    /// a crash mid-write leaves the previous snapshot intact.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            orders: self.list().await,
        };
        let count = snapshot.orders.len();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), orders = count, "Order snapshot saved");
        Ok(count)
    }

    /// Load a store from a snapshot written by [`save_snapshot`](Self::save_snapshot).
    ///
    /// A missing file yields an empty store.
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No order snapshot, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                version = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "Order snapshot version differs, loading anyway"
            );
        }

        let orders = snapshot
            .orders
            .into_iter()
            .map(|o| (o.key(), Arc::new(Mutex::new(o))))
            .collect();

        Ok(Self {
            orders: RwLock::new(orders),
        })
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), StoreError> {
        let key = order.key();
        let mut orders = self.orders.write().await;
        if orders.contains_key(&key) {
            return Err(StoreError::Duplicate(key));
        }
        orders.insert(key, Arc::new(Mutex::new(order)));
        Ok(())
    }

    async fn get(&self, key: &OrderKey) -> Result<Order, StoreError> {
        let slot = self.slot(key).await?;
        let order = slot.lock().await.clone();
        Ok(order)
    }

    async fn list(&self) -> Vec<Order> {
        let slots: Vec<_> = self.orders.read().await.values().cloned().collect();
        let mut orders = Vec::with_capacity(slots.len());
        for slot in slots {
            orders.push(slot.lock().await.clone());
        }
        orders.sort_by(|a, b| a.purchased_at.cmp(&b.purchased_at));
        orders
    }

    async fn transition(
        &self,
        key: &OrderKey,
        from: OrderStatus,
        to: OrderStatus,
        code: Option<SmsCode>,
    ) -> Result<Order, StoreError> {
        let slot = self.slot(key).await?;
        let mut order = slot.lock().await;

        if order.status != from {
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected: from,
                actual: order.status,
            });
        }

        order
            .apply_transition(to, code, Utc::now())
            .map_err(|e| StoreError::from_transition(key, e))?;

        Ok(order.clone())
    }

    async fn mark_consumed(
        &self,
        key: &OrderKey,
        at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let slot = self.slot(key).await?;
        let mut order = slot.lock().await;

        if order.consumed_at.is_some() {
            return Err(StoreError::AlreadyConsumed(key.clone()));
        }
        if !order.is_consumable() {
            return Err(StoreError::NotConsumable {
                key: key.clone(),
                status: order.status,
            });
        }

        order.consumed_at = Some(at);
        Ok(order.clone())
    }

    async fn mark_vendor_closed(
        &self,
        key: &OrderKey,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let slot = self.slot(key).await?;
        let mut order = slot.lock().await;

        if !order.status.is_terminal() && order.vendor_closed.is_none() {
            order.vendor_closed = Some(status);
            order.updated_at = Utc::now();
        }
        Ok(order.clone())
    }
}
