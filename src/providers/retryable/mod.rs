//! Retryable adapter wrapper.

use super::traits::{ProviderAdapter, ProviderError};
use crate::errors::RetryableError;
use crate::order::{Order, OrderSnapshot};
use crate::types::{Balance, Country, OrderId, ProviderId};
use crate::utils::retry::RetryConfig;
use async_trait::async_trait;
use backon::Retryable;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Callback type for retry notifications.
///
/// Invoked each time a retry is attempted with the error that caused it and
/// the delay until the next attempt.
pub type OnRetryCallback = Arc<dyn Fn(&ProviderError, Duration) + Send + Sync>;

/// Wrapper that adds automatic retry logic to any [`ProviderAdapter`].
///
/// Only idempotent reads are retried (`list_countries`, `get_balance`,
/// `check_code`), and only while the error is transient. Purchases and
/// status changes pass straight through: retrying a buy could buy twice.
///
/// # Example
///
/// ```rust,ignore
/// use sms_provisioner::providers::RetryableAdapter;
/// use sms_provisioner::RetryConfig;
/// use std::time::Duration;
///
/// let adapter = RetryableAdapter::with_config(
///     provider,
///     RetryConfig::default().with_max_retries(5),
/// )
/// .with_on_retry(|error, duration| {
///     eprintln!("retrying in {duration:?}: {error}");
/// });
/// ```
pub struct RetryableAdapter<P: ProviderAdapter> {
    inner: Arc<P>,
    retry_config: RetryConfig,
    on_retry: Option<OnRetryCallback>,
}

impl<P: ProviderAdapter> Clone for RetryableAdapter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            retry_config: self.retry_config.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<P: ProviderAdapter + Debug> Debug for RetryableAdapter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryableAdapter")
            .field("inner", &self.inner)
            .field("retry_config", &self.retry_config)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "..."))
            .finish()
    }
}

impl<P: ProviderAdapter> RetryableAdapter<P> {
    /// Wrap an adapter with default retry logic.
    pub fn new(inner: P) -> Self {
        Self::with_config(inner, RetryConfig::default())
    }

    /// Wrap an adapter with custom retry configuration.
    pub fn with_config(inner: P, retry_config: RetryConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            retry_config,
            on_retry: None,
        }
    }

    /// Set a callback to be invoked on each retry attempt.
    pub fn with_on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProviderError, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Get reference to the inner adapter.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Get reference to the retry configuration.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    fn notify(&self, operation: &'static str) -> impl FnMut(&ProviderError, Duration) + use<P> {
        let on_retry = self.on_retry.clone();
        let provider = self.inner.id().clone();
        move |err, duration| {
            if let Some(ref callback) = on_retry {
                callback(err, duration);
            }

            debug!(
                error = %err,
                provider = %provider,
                retry_after_secs = %duration.as_secs_f64(),
                "Retrying {operation}"
            );
        }
    }
}

#[async_trait]
impl<P: ProviderAdapter + 'static> ProviderAdapter for RetryableAdapter<P> {
    fn id(&self) -> &ProviderId {
        self.inner.id()
    }

    async fn list_countries(&self) -> Result<Vec<Country>, ProviderError> {
        let inner = Arc::clone(&self.inner);
        (|| {
            let inner = Arc::clone(&inner);
            async move { inner.list_countries().await }
        })
        .retry(self.retry_config.build_strategy())
        .when(|err: &ProviderError| err.is_retryable())
        .notify(self.notify("list_countries"))
        .await
    }

    async fn get_balance(&self) -> Result<Balance, ProviderError> {
        let inner = Arc::clone(&self.inner);
        (|| {
            let inner = Arc::clone(&inner);
            async move { inner.get_balance().await }
        })
        .retry(self.retry_config.build_strategy())
        .when(|err: &ProviderError| err.is_retryable())
        .notify(self.notify("get_balance"))
        .await
    }

    async fn purchase(
        &self,
        country_code: &str,
        operator: Option<&str>,
    ) -> Result<Order, ProviderError> {
        self.inner.purchase(country_code, operator).await
    }

    #[tracing::instrument(
        name = "RetryableAdapter::check_code",
        skip_all,
        fields(order = %order)
    )]
    async fn check_code(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        let inner = Arc::clone(&self.inner);
        let order_owned = order.clone();
        (|| {
            let inner = Arc::clone(&inner);
            let order = order_owned.clone();
            async move { inner.check_code(&order).await }
        })
        .retry(self.retry_config.build_strategy())
        .when(|err: &ProviderError| err.is_retryable())
        .notify(self.notify("check_code"))
        .await
    }

    async fn cancel(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.inner.cancel(order).await
    }

    async fn finish(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.inner.finish(order).await
    }

    async fn report_abuse(&self, order: &OrderId) -> Result<(), ProviderError> {
        self.inner.report_abuse(order).await
    }
}
