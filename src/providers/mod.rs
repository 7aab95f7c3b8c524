//! SMS vendor adapters and the registry aggregating them.

pub mod countries;
pub mod registry;
pub mod retryable;
pub mod traits;

#[cfg(feature = "five-sim")]
pub mod five_sim;

#[cfg(feature = "online-sim")]
pub mod online_sim;

#[cfg(feature = "sms-activate")]
pub mod sms_activate;

pub use registry::{FanOut, ProviderRegistry};
pub use retryable::{OnRetryCallback, RetryableAdapter};
pub use traits::{ProviderAdapter, ProviderError};

#[cfg(test)]
pub(crate) mod mock;
