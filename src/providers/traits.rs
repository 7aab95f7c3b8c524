//! Provider adapter contract.

use crate::errors::RetryableError;
use crate::order::{Order, OrderSnapshot};
use crate::types::{Balance, Country, OrderId, ProviderId};
use async_trait::async_trait;
use std::error::Error as StdError;
use thiserror::Error;

/// Boxed vendor error kept as the source of a [`ProviderError`].
pub type VendorError = Box<dyn StdError + Send + Sync>;

/// Normalized adapter failure.
///
/// Each vendor module converts its own error type into this taxonomy so
/// that callers never see vendor-specific vocabulary.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure, non-2xx response or vendor-side internal error.
    /// Transient: the poller retries on its next tick.
    #[error("provider {provider} unavailable: {source}")]
    Unavailable {
        provider: ProviderId,
        #[source]
        source: VendorError,
    },

    /// The account cannot pay for the purchase. No order is created.
    #[error("insufficient funds at {provider}: {reason}")]
    InsufficientFunds { provider: ProviderId, reason: String },

    /// No numbers in stock for the requested country. No order is created.
    #[error("{provider} has no numbers for country {country}")]
    OutOfStock {
        provider: ProviderId,
        country: String,
    },

    /// The vendor does not know the order.
    #[error("order {order} not found at {provider}")]
    OrderNotFound { provider: ProviderId, order: OrderId },

    /// The vendor refused the request (bad key, early cancel, bad country).
    #[error("{provider} rejected the request: {source}")]
    Rejected {
        provider: ProviderId,
        #[source]
        source: VendorError,
    },

    /// No adapter is registered under this id.
    #[error("unknown provider {0}")]
    UnknownProvider(ProviderId),
}

impl ProviderError {
    /// Wrap a transient vendor error.
    pub fn unavailable(provider: &ProviderId, source: impl Into<VendorError>) -> Self {
        ProviderError::Unavailable {
            provider: provider.clone(),
            source: source.into(),
        }
    }

    /// Wrap a permanent vendor error.
    pub fn rejected(provider: &ProviderId, source: impl Into<VendorError>) -> Self {
        ProviderError::Rejected {
            provider: provider.clone(),
            source: source.into(),
        }
    }

    /// Classify a vendor error that has no more specific mapping.
    pub fn from_vendor<E>(provider: &ProviderId, error: E) -> Self
    where
        E: RetryableError + StdError + Send + Sync + 'static,
    {
        if error.is_retryable() {
            Self::unavailable(provider, error)
        } else {
            Self::rejected(provider, error)
        }
    }

    /// Provider the error originated from, when known.
    pub fn provider(&self) -> &ProviderId {
        match self {
            ProviderError::Unavailable { provider, .. }
            | ProviderError::InsufficientFunds { provider, .. }
            | ProviderError::OutOfStock { provider, .. }
            | ProviderError::OrderNotFound { provider, .. }
            | ProviderError::Rejected { provider, .. }
            | ProviderError::UnknownProvider(provider) => provider,
        }
    }
}

impl RetryableError for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable { .. })
    }

    fn should_retry_operation(&self) -> bool {
        match self {
            ProviderError::Unavailable { .. } => true,
            // Another country or provider may have stock
            ProviderError::OutOfStock { .. } => true,
            // Need a top-up or a fix first
            ProviderError::InsufficientFunds { .. }
            | ProviderError::OrderNotFound { .. }
            | ProviderError::Rejected { .. }
            | ProviderError::UnknownProvider(_) => false,
        }
    }
}

/// Core trait every SMS vendor adapter implements.
///
/// The adapter owns the mapping from the vendor's status vocabulary onto
/// [`OrderStatus`](crate::order::OrderStatus); nothing vendor-specific
/// leaves it.
///
/// # Example
///
/// ```rust,ignore
/// use sms_provisioner::providers::ProviderAdapter;
///
/// let countries = adapter.list_countries().await?;
/// let order = adapter.purchase("usa", None).await?;
/// let snapshot = adapter.check_code(&order.id).await?;
/// ```
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier recorded on every order this adapter sells.
    fn id(&self) -> &ProviderId;

    /// Country catalog with prices and stock.
    async fn list_countries(&self) -> Result<Vec<Country>, ProviderError>;

    /// Current account balance.
    async fn get_balance(&self) -> Result<Balance, ProviderError>;

    /// Buy a number. Returns a new order in `PENDING`.
    async fn purchase(
        &self,
        country_code: &str,
        operator: Option<&str>,
    ) -> Result<Order, ProviderError>;

    /// Check for an arrived code.
    ///
    /// Idempotent: repeated calls return the same code once one was
    /// received, or the current non-terminal status otherwise.
    async fn check_code(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError>;

    /// Cancel the order; the vendor refunds it.
    async fn cancel(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError>;

    /// Mark the order complete; the vendor recycles the number.
    async fn finish(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError>;

    /// Flag the number as banned or unusable.
    async fn report_abuse(&self, order: &OrderId) -> Result<(), ProviderError>;
}
