//! Orders and their lifecycle state machine.
//!
//! ```text
//!  PENDING ──▶ WAITING ──▶ RECEIVED ──▶ FINISHED
//!                 │  │         │  │
//!                 │  └─▶ TIMEOUT  │
//!                 ├──────────────┴──▶ CANCELED
//!                 └──────────────┴──▶ BANNED
//! ```
//!
//! `FINISHED`, `CANCELED`, `TIMEOUT` and `BANNED` are terminal. `RECEIVED`
//! is terminal for code acquisition only; the order can still be consumed
//! by a handoff, finished, canceled or banned.

pub mod claims;
pub mod lifecycle;
pub mod store;

pub use claims::{OrderClaim, OrderClaims};
pub use lifecycle::{ReconcileOutcome, reconcile};
pub use store::{InMemoryOrderStore, OrderStore, StoreError};

use crate::types::{OrderId, OrderKey, PhoneNumber, ProviderId, SmsCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Normalized order status shared by all vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Purchased; the vendor may still impose an activation delay.
    Pending,
    /// Activation delay elapsed; eligible for polling.
    Waiting,
    /// Verification code captured.
    Received,
    /// Vendor-side completion.
    Finished,
    /// Refunded.
    Canceled,
    /// Vendor-side expiry without a code.
    Timeout,
    /// Reported abusive.
    Banned,
}

impl OrderStatus {
    /// All statuses, in lattice order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Waiting,
        OrderStatus::Received,
        OrderStatus::Finished,
        OrderStatus::Canceled,
        OrderStatus::Timeout,
        OrderStatus::Banned,
    ];

    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Finished
                | OrderStatus::Canceled
                | OrderStatus::Timeout
                | OrderStatus::Banned
        )
    }

    /// Whether `self -> next` is an edge of the lattice.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Waiting)
                | (Waiting, Received)
                | (Waiting, Canceled)
                | (Received, Canceled)
                | (Received, Finished)
                | (Waiting, Timeout)
                | (Waiting, Banned)
                | (Received, Banned)
        )
    }

    /// Sequence of edges leading from `self` to `target`.
    ///
    /// Returns an empty path when already there. A `Pending` order reaches
    /// any status `Waiting` can reach by passing through `Waiting` first.
    /// `None` means no path exists.
    pub fn path_to(self, target: OrderStatus) -> Option<Vec<OrderStatus>> {
        if self == target {
            return Some(Vec::new());
        }
        if self.can_transition_to(target) {
            return Some(vec![target]);
        }
        if self == OrderStatus::Pending && OrderStatus::Waiting.can_transition_to(target) {
            return Some(vec![OrderStatus::Waiting, target]);
        }
        None
    }

    /// Path toward a vendor observation.
    ///
    /// An observation that carries a code and ends in a status `RECEIVED`
    /// can reach is routed through `RECEIVED`, so the code is recorded
    /// before the order closes. Otherwise this is [`OrderStatus::path_to`].
    pub fn path_observing(self, target: OrderStatus, with_code: bool) -> Option<Vec<OrderStatus>> {
        if with_code
            && target != OrderStatus::Received
            && OrderStatus::Received.can_transition_to(target)
            && let Some(mut path) = self.path_to(OrderStatus::Received)
        {
            path.push(target);
            return Some(path);
        }
        self.path_to(target)
    }

    /// Upper-case label used in logs and snapshots.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Waiting => "WAITING",
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Finished => "FINISHED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Timeout => "TIMEOUT",
            OrderStatus::Banned => "BANNED",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected lifecycle move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The edge is not part of the lattice.
    #[error("invalid transition {from} -> {to}")]
    Invalid { from: OrderStatus, to: OrderStatus },

    /// `RECEIVED` entered without a verification code.
    #[error("cannot enter RECEIVED without a verification code")]
    MissingCode,
}

/// Normalized view of an order as reported by a vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    /// Vendor status mapped onto the lattice.
    pub status: OrderStatus,
    /// Code, when the vendor has one.
    pub code: Option<SmsCode>,
}

impl OrderSnapshot {
    /// Snapshot without a code.
    pub fn status(status: OrderStatus) -> Self {
        Self { status, code: None }
    }

    /// Snapshot of a received code.
    pub fn received(code: impl Into<SmsCode>) -> Self {
        Self {
            status: OrderStatus::Received,
            code: Some(code.into()),
        }
    }
}

/// One purchased virtual number and its verification lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Vendor order id.
    pub id: OrderId,
    /// Provider that sold the number.
    pub provider: ProviderId,
    /// Vendor country code the number was bought for.
    pub country_code: String,
    /// ISO alpha-2 hint of the number's country, used for region matching.
    pub iso_hint: Option<String>,
    /// Operator requested at purchase.
    pub operator: Option<String>,
    /// The purchased number.
    pub phone_number: PhoneNumber,
    /// Price paid.
    pub price: f64,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Verification code; immutable once set.
    pub verification_code: Option<SmsCode>,
    /// Purchase time.
    pub purchased_at: DateTime<Utc>,
    /// End of the vendor-imposed activation delay.
    pub available_at: Option<DateTime<Utc>>,
    /// Set exactly once by the session handoff.
    pub consumed_at: Option<DateTime<Utc>>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
    /// Terminal status the vendor reported with no lattice path from
    /// `status`. The order is no longer polled once this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_closed: Option<OrderStatus>,
}

impl Order {
    /// New order in `PENDING`, as produced by a purchase.
    pub fn pending(
        provider: ProviderId,
        id: OrderId,
        country_code: impl Into<String>,
        phone_number: PhoneNumber,
        price: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            provider,
            country_code: country_code.into(),
            iso_hint: None,
            operator: None,
            phone_number,
            price,
            status: OrderStatus::Pending,
            verification_code: None,
            purchased_at: now,
            available_at: None,
            consumed_at: None,
            updated_at: now,
            vendor_closed: None,
        }
    }

    /// Address of this order across providers.
    pub fn key(&self) -> OrderKey {
        OrderKey {
            provider: self.provider.clone(),
            id: self.id.clone(),
        }
    }

    /// Whether the activation delay has elapsed at `now`.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.available_at.is_none_or(|at| at <= now)
    }

    /// Non-terminal, still without a code and not closed by the vendor:
    /// the poller's working set.
    pub fn is_trackable(&self) -> bool {
        !self.status.is_terminal()
            && self.verification_code.is_none()
            && self.vendor_closed.is_none()
    }

    /// Whether a handoff may consume this order.
    pub fn is_consumable(&self) -> bool {
        self.status == OrderStatus::Received
            && self.verification_code.is_some()
            && self.consumed_at.is_none()
    }

    /// Apply one lattice edge.
    ///
    /// The code is only recorded on the move into `RECEIVED` and is never
    /// overwritten afterwards.
    pub fn apply_transition(
        &mut self,
        to: OrderStatus,
        code: Option<SmsCode>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError::Invalid {
                from: self.status,
                to,
            });
        }
        if to == OrderStatus::Received {
            let code = code.ok_or(TransitionError::MissingCode)?;
            if self.verification_code.is_none() {
                self.verification_code = Some(code);
            }
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}
