//! Proxy inventory with capacity- and region-aware assignment.

use super::region::{RegionPolicy, RegionTable};
use super::{
    AssignmentReason, HealthStatus, ProxyAssignment, ProxyError, ProxyServer, RegionPreference,
};
use crate::types::{OrderKey, ProxyId, Region};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct PoolState {
    proxies: BTreeMap<ProxyId, ProxyServer>,
    assignments: HashMap<OrderKey, ProxyAssignment>,
}

impl PoolState {
    /// Least loaded eligible proxy, ties broken by id.
    fn pick(&self, region: Option<&Region>) -> Option<ProxyId> {
        self.proxies
            .values()
            .filter(|p| region.is_none_or(|r| &p.region == r))
            .filter(|p| p.is_eligible())
            .min_by(|a, b| {
                a.active_sessions
                    .cmp(&b.active_sessions)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|p| p.id.clone())
    }
}

/// Fixed proxy inventory shared by every handoff.
///
/// Selection and the session-count increment happen under one lock, so two
/// concurrent assignments can never both see the last free slot.
pub struct ProxyPool {
    state: Mutex<PoolState>,
    policy: Arc<dyn RegionPolicy>,
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new(Arc::new(RegionTable::new()))
    }
}

impl std::fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPool").finish_non_exhaustive()
    }
}

impl ProxyPool {
    /// Create an empty pool using `policy` for automatic region selection.
    pub fn new(policy: Arc<dyn RegionPolicy>) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            policy,
        }
    }

    /// Seed the inventory while building the pool. Later duplicates replace
    /// earlier ones.
    pub fn with_proxies(mut self, proxies: impl IntoIterator<Item = ProxyServer>) -> Self {
        let state = self.state.get_mut();
        for proxy in proxies {
            state.proxies.insert(proxy.id.clone(), proxy);
        }
        self
    }

    /// Add a proxy to the inventory.
    pub async fn add_proxy(&self, proxy: ProxyServer) -> Result<(), ProxyError> {
        let mut state = self.state.lock().await;
        if state.proxies.contains_key(&proxy.id) {
            return Err(ProxyError::DuplicateProxy(proxy.id));
        }
        debug!(proxy = %proxy.id, region = %proxy.region, "Proxy added");
        state.proxies.insert(proxy.id.clone(), proxy);
        Ok(())
    }

    /// Inventory snapshot, ordered by id.
    pub async fn proxies(&self) -> Vec<ProxyServer> {
        self.state.lock().await.proxies.values().cloned().collect()
    }

    /// One proxy by id.
    pub async fn proxy(&self, id: &ProxyId) -> Option<ProxyServer> {
        self.state.lock().await.proxies.get(id).cloned()
    }

    /// Record a probe result. Returns the previous status.
    pub async fn set_health(
        &self,
        id: &ProxyId,
        health: HealthStatus,
    ) -> Result<HealthStatus, ProxyError> {
        let mut state = self.state.lock().await;
        let proxy = state
            .proxies
            .get_mut(id)
            .ok_or_else(|| ProxyError::UnknownProxy(id.clone()))?;

        let previous = std::mem::replace(&mut proxy.health, health);
        if previous != health {
            match health {
                HealthStatus::Dead => {
                    warn!(proxy = %id, sessions = proxy.active_sessions, "Proxy marked dead")
                }
                _ => info!(proxy = %id, from = %previous, to = %health, "Proxy health changed"),
            }
        }
        Ok(previous)
    }

    /// Current assignment of `subject`, if any.
    pub async fn assignment(&self, subject: &OrderKey) -> Option<ProxyAssignment> {
        self.state.lock().await.assignments.get(subject).cloned()
    }

    /// Assign a proxy to `subject`.
    ///
    /// With [`RegionPreference::Explicit`] only that region qualifies and
    /// [`ProxyError::NoCapacityInRegion`] is returned when it is full or
    /// dead. With [`RegionPreference::Automatic`] the region is derived from
    /// `iso_hint`; when it has no capacity any region qualifies and the
    /// assignment is tagged [`AssignmentReason::AutoFallback`].
    #[tracing::instrument(name = "ProxyPool::assign", skip_all, fields(subject = %subject))]
    pub async fn assign(
        &self,
        subject: &OrderKey,
        preference: &RegionPreference,
        iso_hint: Option<&str>,
    ) -> Result<ProxyAssignment, ProxyError> {
        let mut state = self.state.lock().await;
        if state.assignments.contains_key(subject) {
            return Err(ProxyError::AlreadyAssigned(subject.clone()));
        }

        let (proxy_id, reason) = match preference {
            RegionPreference::Explicit(region) => {
                let id = state
                    .pick(Some(region))
                    .ok_or_else(|| ProxyError::NoCapacityInRegion(region.clone()))?;
                (id, AssignmentReason::Manual)
            }
            RegionPreference::Automatic => {
                let preferred = iso_hint.and_then(|iso| self.policy.region_for(iso));
                match preferred.as_ref().and_then(|r| state.pick(Some(r))) {
                    Some(id) => (id, AssignmentReason::AutoRegionMatch),
                    None => {
                        let id = state.pick(None).ok_or(ProxyError::NoCapacity)?;
                        info!(
                            preferred = preferred.as_ref().map(Region::as_str).unwrap_or("none"),
                            proxy = %id,
                            "No capacity in preferred region, falling back"
                        );
                        (id, AssignmentReason::AutoFallback)
                    }
                }
            }
        };

        let proxy = state
            .proxies
            .get_mut(&proxy_id)
            .ok_or_else(|| ProxyError::UnknownProxy(proxy_id.clone()))?;
        proxy.active_sessions += 1;

        let assignment = ProxyAssignment {
            subject: subject.clone(),
            proxy_id,
            region: proxy.region.clone(),
            assigned_at: Utc::now(),
            reason,
        };
        debug!(
            proxy = %assignment.proxy_id,
            region = %assignment.region,
            reason = %reason,
            sessions = proxy.active_sessions,
            "Proxy assigned"
        );
        state
            .assignments
            .insert(subject.clone(), assignment.clone());
        Ok(assignment)
    }

    /// Drop the assignment of `subject` and free its slot.
    pub async fn release(&self, subject: &OrderKey) -> Result<ProxyAssignment, ProxyError> {
        let mut state = self.state.lock().await;
        let assignment = state
            .assignments
            .remove(subject)
            .ok_or_else(|| ProxyError::NotAssigned(subject.clone()))?;

        if let Some(proxy) = state.proxies.get_mut(&assignment.proxy_id) {
            proxy.active_sessions = proxy.active_sessions.saturating_sub(1);
        }
        debug!(subject = %subject, proxy = %assignment.proxy_id, "Proxy released");
        Ok(assignment)
    }
}
