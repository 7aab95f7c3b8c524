//! Proxy health probing.
//!
//! Health is an input to the pool: the monitor writes `health`, the pool
//! reads it at assignment time.

use super::pool::ProxyPool;
use super::{HealthStatus, ProxyServer};
use crate::types::ProxyId;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Decides whether a proxy is usable.
#[async_trait]
pub trait HealthProber: Send + Sync {
    /// Probe one proxy. [`HealthStatus::Unknown`] leaves its status as is.
    async fn probe(&self, proxy: &ProxyServer) -> HealthStatus;
}

/// Marks a proxy healthy when a TCP connection to its `host` opens in time.
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl HealthProber for TcpProber {
    async fn probe(&self, proxy: &ProxyServer) -> HealthStatus {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&proxy.host)).await {
            Ok(Ok(_)) => HealthStatus::Healthy,
            Ok(Err(e)) => {
                debug!(proxy = %proxy.id, error = %e, "Proxy connect failed");
                HealthStatus::Dead
            }
            Err(_) => {
                debug!(proxy = %proxy.id, "Proxy connect timed out");
                HealthStatus::Dead
            }
        }
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Time between probe rounds.
    pub interval: Duration,
    /// Consecutive failed probes before a proxy is marked dead.
    pub failure_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            failure_threshold: 2,
        }
    }
}

impl HealthMonitorConfig {
    /// Set the probe interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the failure threshold. Zero is raised to one.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }
}

/// Background loop applying probe results to the pool.
pub struct HealthMonitor {
    pool: Arc<ProxyPool>,
    prober: Arc<dyn HealthProber>,
    config: HealthMonitorConfig,
    failures: Mutex<HashMap<ProxyId, u32>>,
}

impl HealthMonitor {
    pub fn new(
        pool: Arc<ProxyPool>,
        prober: Arc<dyn HealthProber>,
        config: HealthMonitorConfig,
    ) -> Self {
        Self {
            pool,
            prober,
            config,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Probe until `token` is cancelled.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        self.check_all().await;
                    }
                }
            }
            info!("Proxy health monitor stopped");
        })
    }

    /// Probe every proxy once. Returns how many changed status.
    pub async fn check_all(&self) -> usize {
        let proxies = self.pool.proxies().await;
        let results = join_all(proxies.iter().map(|proxy| async move {
            (proxy.id.clone(), proxy.health, self.prober.probe(proxy).await)
        }))
        .await;

        let mut changed = 0;
        let mut failures = self.failures.lock().await;
        for (id, current, observed) in results {
            let next = match observed {
                HealthStatus::Healthy => {
                    failures.remove(&id);
                    HealthStatus::Healthy
                }
                HealthStatus::Dead => {
                    let count = failures.entry(id.clone()).or_insert(0);
                    *count += 1;
                    if *count >= self.config.failure_threshold {
                        HealthStatus::Dead
                    } else {
                        debug!(proxy = %id, failures = *count, "Probe failed");
                        current
                    }
                }
                HealthStatus::Unknown => current,
            };

            if next != current {
                match self.pool.set_health(&id, next).await {
                    Ok(_) => changed += 1,
                    Err(e) => warn!(proxy = %id, error = %e, "Could not record proxy health"),
                }
            }
        }
        changed
    }
}
