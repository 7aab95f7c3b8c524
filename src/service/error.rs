//! Service-level error types.

use crate::errors::RetryableError;
use crate::handoff::HandoffError;
use crate::order::StoreError;
use crate::providers::ProviderError;
use crate::proxy::ProxyError;
use thiserror::Error;

/// Errors surfaced by the [`ProvisioningService`](super::ProvisioningService).
///
/// Each variant keeps the layer error intact so callers can report the
/// specific reason (funds, stock, network, lifecycle, capacity).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Vendor-level failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Order store failure, including rejected lifecycle transitions.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Proxy assignment failure.
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Session handoff failure.
    #[error(transparent)]
    Handoff(#[from] HandoffError),
}

impl ServiceError {
    /// Whether the operation was rejected because it is not a lifecycle edge.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::InvalidTransition { .. }))
    }
}

impl RetryableError for ServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Provider(e) => e.is_retryable(),
            ServiceError::Store(e) => e.is_retryable(),
            ServiceError::Proxy(e) => e.is_retryable(),
            ServiceError::Handoff(e) => e.is_retryable(),
        }
    }

    fn should_retry_operation(&self) -> bool {
        match self {
            ServiceError::Provider(e) => e.should_retry_operation(),
            ServiceError::Store(e) => e.should_retry_operation(),
            ServiceError::Proxy(e) => e.should_retry_operation(),
            ServiceError::Handoff(e) => e.should_retry_operation(),
        }
    }
}
