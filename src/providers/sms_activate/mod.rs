//! SMS Activate provider implementation.
//!
//! Integration with the `handler_api.php` family of SMS verification
//! services.
//!
//! # Example
//!
//! ```rust,ignore
//! use sms_provisioner::providers::sms_activate::{SmsActivateClient, SmsActivateProvider};
//! use sms_provisioner::providers::ProviderAdapter;
//!
//! let client = SmsActivateClient::with_api_key("your_api_key")?;
//! let provider = SmsActivateProvider::new(client);
//!
//! let countries = provider.list_countries().await?;
//! let order = provider.purchase("187", None).await?;
//! let snapshot = provider.check_code(&order.id).await?;
//! ```

pub mod client;
pub mod errors;
pub mod provider;
mod response;
pub mod types;

// Re-export commonly used types
pub use client::SmsActivateClient;
pub use errors::{SmsActivateError, SmsActivateErrorCode};
pub use provider::SmsActivateProvider;
