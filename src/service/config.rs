//! Service configuration types.

use crate::poller::PollerConfig;
use crate::proxy::HealthMonitorConfig;
use std::time::Duration;

/// Configuration for the [`ProvisioningService`](super::ProvisioningService).
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// How long an order may sit in `WAITING` before it is flagged stale.
    pub stale_after: Duration,
    /// Interval of the background catalog and balance refresh.
    pub catalog_refresh_interval: Duration,
    /// Reconciliation poller settings.
    pub poller: PollerConfig,
    /// Proxy health monitor settings.
    pub health: HealthMonitorConfig,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(20 * 60),
            catalog_refresh_interval: Duration::from_secs(5 * 60),
            poller: PollerConfig::default(),
            health: HealthMonitorConfig::default(),
        }
    }
}

impl ProvisionerConfig {
    /// Create a new builder for ProvisionerConfig.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sms_provisioner::{PollerConfig, ProvisionerConfig};
    /// use std::time::Duration;
    ///
    /// let config = ProvisionerConfig::builder()
    ///     .stale_after(Duration::from_secs(600))
    ///     .poller(PollerConfig::fast())
    ///     .build();
    ///
    /// assert_eq!(config.stale_after, Duration::from_secs(600));
    /// assert_eq!(config.poller, PollerConfig::fast());
    /// ```
    pub fn builder() -> ProvisionerConfigBuilder {
        ProvisionerConfigBuilder::default()
    }

    /// Create a new config with a custom stale threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Create a new config with a custom catalog refresh interval.
    pub fn with_catalog_refresh_interval(mut self, interval: Duration) -> Self {
        self.catalog_refresh_interval = interval;
        self
    }

    /// Create a new config with custom poller settings.
    pub fn with_poller(mut self, poller: PollerConfig) -> Self {
        self.poller = poller;
        self
    }
}

/// Builder for ProvisionerConfig.
#[derive(Debug, Clone, Default)]
pub struct ProvisionerConfigBuilder {
    config: ProvisionerConfig,
}

impl ProvisionerConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long an order may wait for a code before it is flagged stale.
    ///
    /// Default: 20 minutes
    pub fn stale_after(mut self, stale_after: Duration) -> Self {
        self.config.stale_after = stale_after;
        self
    }

    /// Set the background catalog and balance refresh interval.
    ///
    /// Default: 5 minutes
    pub fn catalog_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.catalog_refresh_interval = interval;
        self
    }

    /// Set the poller configuration.
    pub fn poller(mut self, poller: PollerConfig) -> Self {
        self.config.poller = poller;
        self
    }

    /// Set the proxy health monitor configuration.
    pub fn health(mut self, health: HealthMonitorConfig) -> Self {
        self.config.health = health;
        self
    }

    /// Build the ProvisionerConfig.
    pub fn build(self) -> ProvisionerConfig {
        self.config
    }
}
