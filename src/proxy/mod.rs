//! Egress proxy inventory and session assignment.
//!
//! Every messaging session is bound to one proxy. The pool enforces two
//! invariants under concurrent assignment: a proxy never carries more
//! sessions than its capacity, and a proxy observed dead never receives a
//! new session.

mod health;
mod pool;
mod region;

pub use health::{HealthMonitor, HealthMonitorConfig, HealthProber, TcpProber};
pub use pool::ProxyPool;
pub use region::{RegionPolicy, RegionTable};

use crate::errors::RetryableError;
use crate::types::{OrderKey, ProxyId, Region};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Last known health of a proxy, as reported by the prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Dead,
    /// Not probed yet, or the last probe was inconclusive.
    #[default]
    Unknown,
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Dead => "dead",
            HealthStatus::Unknown => "unknown",
        })
    }
}

/// One egress proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyServer {
    pub id: ProxyId,
    pub region: Region,
    /// `host:port` the proxy listens on.
    pub host: String,
    pub health: HealthStatus,
    /// Sessions currently bound; never above `capacity`.
    pub active_sessions: u32,
    pub capacity: u32,
}

impl ProxyServer {
    /// New proxy with no sessions and unknown health.
    pub fn new(
        id: impl Into<String>,
        region: impl AsRef<str>,
        host: impl Into<String>,
        capacity: u32,
    ) -> Self {
        Self {
            id: ProxyId::new(id),
            region: Region::new(region),
            host: host.into(),
            health: HealthStatus::Unknown,
            active_sessions: 0,
            capacity,
        }
    }

    /// Set the initial health.
    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = health;
        self
    }

    /// Not dead and below capacity.
    pub fn is_eligible(&self) -> bool {
        self.health != HealthStatus::Dead && self.active_sessions < self.capacity
    }
}

/// How a proxy was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentReason {
    /// The caller named the region.
    Manual,
    /// Automatic selection found capacity in the number's region.
    AutoRegionMatch,
    /// Automatic selection had to go outside the number's region.
    AutoFallback,
}

impl Display for AssignmentReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignmentReason::Manual => "manual",
            AssignmentReason::AutoRegionMatch => "auto-region-match",
            AssignmentReason::AutoFallback => "auto-fallback",
        })
    }
}

/// Region choice supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegionPreference {
    /// Hard constraint: only this region.
    Explicit(Region),
    /// Derive the region from the number's country, falling back anywhere.
    #[default]
    Automatic,
}

/// Binding of one order's session to a proxy. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAssignment {
    pub subject: OrderKey,
    pub proxy_id: ProxyId,
    pub region: Region,
    pub assigned_at: DateTime<Utc>,
    pub reason: AssignmentReason,
}

/// Errors returned by the [`ProxyPool`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The explicitly requested region has no live proxy with spare capacity.
    #[error("no proxy with capacity in region {0}")]
    NoCapacityInRegion(Region),

    /// No live proxy with spare capacity anywhere.
    #[error("no proxy with spare capacity")]
    NoCapacity,

    #[error("unknown proxy {0}")]
    UnknownProxy(ProxyId),

    #[error("proxy {0} already exists")]
    DuplicateProxy(ProxyId),

    /// The subject already holds an assignment.
    #[error("{0} already has a proxy assignment")]
    AlreadyAssigned(OrderKey),

    #[error("{0} has no proxy assignment")]
    NotAssigned(OrderKey),
}

impl RetryableError for ProxyError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn should_retry_operation(&self) -> bool {
        // Capacity frees up as sessions are released
        matches!(
            self,
            ProxyError::NoCapacityInRegion(_) | ProxyError::NoCapacity
        )
    }
}
