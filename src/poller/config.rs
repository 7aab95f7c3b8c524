//! Poller configuration types.

use std::time::Duration;

/// Default tick interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Default cap on concurrent vendor checks per tick.
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 8;

/// Configuration for the [`ReconciliationPoller`](super::ReconciliationPoller).
///
/// The interval is a policy constant; correctness does not depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Maximum vendor checks in flight during one tick.
    pub max_concurrent_checks: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
        }
    }
}

impl PollerConfig {
    /// Create a new builder for PollerConfig.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sms_provisioner::PollerConfig;
    /// use std::time::Duration;
    ///
    /// let config = PollerConfig::builder()
    ///     .interval(Duration::from_secs(5))
    ///     .max_concurrent_checks(4)
    ///     .build();
    ///
    /// assert_eq!(config.interval, Duration::from_secs(5));
    /// assert_eq!(config.max_concurrent_checks, 4);
    /// ```
    pub fn builder() -> PollerConfigBuilder {
        PollerConfigBuilder::default()
    }

    /// Short interval for interactive use, where a code should show up quickly.
    pub fn fast() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_concurrent_checks: 16,
        }
    }

    /// Long interval for large backlogs that should go easy on vendor limits.
    pub fn relaxed() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_concurrent_checks: 4,
        }
    }

    /// Create a new config with a custom interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Create a new config with a custom concurrency cap.
    pub fn with_max_concurrent_checks(mut self, max: usize) -> Self {
        self.max_concurrent_checks = max.max(1);
        self
    }
}

/// Builder for PollerConfig.
#[derive(Debug, Clone, Default)]
pub struct PollerConfigBuilder {
    config: PollerConfig,
}

impl PollerConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    ///
    /// Default: 10 seconds
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the cap on concurrent vendor checks. Zero is raised to one.
    ///
    /// Default: 8
    pub fn max_concurrent_checks(mut self, max: usize) -> Self {
        self.config = self.config.with_max_concurrent_checks(max);
        self
    }

    /// Build the PollerConfig.
    pub fn build(self) -> PollerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poller_config_default() {
        let config = PollerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_checks, 8);
    }

    #[test]
    fn test_config_builder() {
        let config = PollerConfig::builder()
            .interval(Duration::from_secs(1))
            .max_concurrent_checks(0)
            .build();

        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.max_concurrent_checks, 1);
    }

    #[test]
    fn test_presets() {
        assert!(PollerConfig::fast().interval < PollerConfig::default().interval);
        assert!(PollerConfig::relaxed().interval > PollerConfig::default().interval);
    }
}
