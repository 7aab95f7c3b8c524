//! 5sim provider implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use sms_provisioner::providers::five_sim::{FiveSimClient, FiveSimProvider};
//! use sms_provisioner::providers::ProviderAdapter;
//!
//! let client = FiveSimClient::with_api_key("your_api_token")?;
//! let provider = FiveSimProvider::new(client);
//!
//! let order = provider.purchase("usa", None).await?;
//! ```

pub mod client;
pub mod errors;
pub mod provider;
pub mod types;

pub use client::FiveSimClient;
pub use errors::{FiveSimError, FiveSimErrorCode};
pub use provider::FiveSimProvider;
