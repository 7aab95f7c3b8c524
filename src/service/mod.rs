//! Provisioning facade over registry, store, poller, proxy pool and handoff.

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod structure;

pub use config::{ProvisionerConfig, ProvisionerConfigBuilder};
pub use error::ServiceError;
pub use structure::{
    BackgroundTasks, OrderView, ProvisioningService, ProvisioningServiceBuilder,
};
