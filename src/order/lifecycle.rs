//! Applying vendor observations and explicit operations to stored orders.

use super::store::{OrderStore, StoreError};
use super::{Order, OrderSnapshot};
use crate::types::OrderKey;
use tracing::{debug, warn};

/// Compare-and-set attempts before giving up on a contended order.
const MAX_CAS_ATTEMPTS: usize = 4;

/// Result of reconciling an order against an observed state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Order after reconciliation.
    pub order: Order,
    /// Whether the stored status changed.
    pub changed: bool,
}

/// Drive the stored order toward `observed` along the lifecycle lattice.
///
/// Each edge is applied with compare-and-set. When another writer moves the
/// order in between, the path is recomputed from the fresh state, so a
/// racing cancel and poll update can never produce a non-lattice edge.
///
/// An observation carrying a code is routed through `RECEIVED` when that is
/// a lattice path, so a vendor that finished the order between polls still
/// yields the code. Observations against a terminal order, or ones with no
/// lattice path, are rejected with [`StoreError::InvalidTransition`] and
/// logged; when the vendor side is terminal the order is also marked
/// vendor-closed so the poller stops checking it.
pub async fn reconcile(
    store: &dyn OrderStore,
    key: &OrderKey,
    observed: &OrderSnapshot,
) -> Result<ReconcileOutcome, StoreError> {
    let mut changed = false;

    for _ in 0..MAX_CAS_ATTEMPTS {
        let current = store.get(key).await?;

        let Some(path) = current
            .status
            .path_observing(observed.status, observed.code.is_some())
        else {
            warn!(
                order = %key,
                from = %current.status,
                to = %observed.status,
                "Rejected lifecycle transition"
            );
            if observed.status.is_terminal() && !current.status.is_terminal() {
                store.mark_vendor_closed(key, observed.status).await?;
                warn!(order = %key, vendor = %observed.status, "Vendor closed the order, no longer polling");
            }
            return Err(StoreError::InvalidTransition {
                key: key.clone(),
                from: current.status,
                to: observed.status,
            });
        };

        if path.is_empty() {
            return Ok(ReconcileOutcome {
                order: current,
                changed,
            });
        }

        let mut from = current.status;
        let mut latest = current;
        let mut lost_race = false;

        for step in path {
            match store
                .transition(key, from, step, observed.code.clone())
                .await
            {
                Ok(order) => {
                    debug!(order = %key, from = %from, to = %step, "Order transitioned");
                    changed = true;
                    from = step;
                    latest = order;
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    debug!(order = %key, expected = %from, actual = %actual, "Lost compare-and-set, retrying");
                    lost_race = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if !lost_race {
            return Ok(ReconcileOutcome {
                order: latest,
                changed,
            });
        }
    }

    let current = store.get(key).await?;
    Err(StoreError::Conflict {
        key: key.clone(),
        expected: observed.status,
        actual: current.status,
    })
}
