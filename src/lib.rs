//! # SMS Provisioner
//!
//! Virtual phone number provisioning across several SMS verification
//! vendors, with background code reconciliation and a one-shot handoff of
//! verified numbers to proxy-bound messaging sessions.
//!
//! ## Supported Providers
//!
//! | Provider | Feature | Website |
//! |----------|---------|---------|
//! | 5sim | `five-sim` (default) | <https://5sim.net> |
//! | SMS Activate | `sms-activate` (default) | <https://sms-activate.org> |
//! | OnlineSim | `online-sim` (default) | <https://onlinesim.io> |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sms_provisioner::{
//!     InMemoryOrderStore, HttpSessionCreator, ProviderRegistry, ProvisioningService,
//!     ProxyPool, ProxyServer, RegionPreference, RetryableAdapter, RegionTable,
//! };
//! use sms_provisioner::five_sim::{FiveSimClient, FiveSimProvider};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let five_sim = FiveSimProvider::new(FiveSimClient::with_api_key("your_api_key")?);
//!     let registry = ProviderRegistry::new()
//!         .with_provider(Arc::new(RetryableAdapter::new(five_sim)));
//!
//!     let pool = ProxyPool::new(Arc::new(RegionTable::new()))
//!         .with_proxies([ProxyServer::new("us-1", "us", "10.0.0.1:3128", 20)]);
//!
//!     let service = ProvisioningService::builder(
//!         Arc::new(registry),
//!         Arc::new(InMemoryOrderStore::new()),
//!         Arc::new(pool),
//!         Arc::new(HttpSessionCreator::new("http://sessions.internal/create")?),
//!     )
//!     .build();
//!
//!     let tasks = service.start(CancellationToken::new());
//!
//!     let order = service.purchase(&"5sim".into(), "usa", None).await?;
//!     println!("Got number: {}", order.phone_number.with_plus_prefix());
//!
//!     // Once the poller has captured the code:
//!     let handoff = service.handoff(&order.key(), &RegionPreference::Automatic).await?;
//!     println!("Session {} via {}", handoff.session_id, handoff.assignment.proxy_id);
//!
//!     tasks.join().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!                      ProvisioningService
//!        ┌──────────────┬──────┴───────┬──────────────────┐
//!        ▼              ▼              ▼                  ▼
//! ProviderRegistry  OrderStore  ReconciliationPoller  HandoffCoordinator
//!        │                                            │           │
//!        ▼                                            ▼           ▼
//! RetryableAdapter<P>  (optional retry wrapper)   ProxyPool  SessionCreator
//!        │
//!        ▼
//! ProviderAdapter  (trait: FiveSimProvider, SmsActivateProvider, OnlineSimProvider)
//! ```
//!
//! ## Features
//!
//! - `five-sim`, `sms-activate`, `online-sim` - vendor adapters (all enabled by default)
//! - `otel` - record OpenTelemetry span status from vendor clients

pub mod errors;
pub mod handoff;
pub mod order;
pub mod poller;
pub mod providers;
pub mod proxy;
pub mod service;
pub mod types;
pub mod utils;

#[cfg(feature = "five-sim")]
pub use providers::five_sim;
#[cfg(feature = "online-sim")]
pub use providers::online_sim;
#[cfg(feature = "sms-activate")]
pub use providers::sms_activate;

// Re-export commonly used types at the crate root
pub use errors::RetryableError;
pub use handoff::{Handoff, HandoffCoordinator, HandoffError, HttpSessionCreator, SessionCreator};
pub use order::{
    InMemoryOrderStore, Order, OrderClaims, OrderSnapshot, OrderStatus, OrderStore, StoreError,
};
pub use poller::{PollerConfig, ReconciliationPoller, TickReport};
pub use providers::{FanOut, ProviderAdapter, ProviderError, ProviderRegistry, RetryableAdapter};
pub use proxy::{
    AssignmentReason, HealthStatus, ProxyAssignment, ProxyError, ProxyPool, ProxyServer,
    RegionPolicy, RegionPreference, RegionTable,
};
pub use service::{OrderView, ProvisionerConfig, ProvisioningService, ServiceError};
pub use types::{
    Balance, Country, OrderId, OrderKey, PhoneNumber, ProviderId, ProxyId, Region, Service,
    SessionId, SmsCode,
};
pub use utils::retry::RetryConfig;
