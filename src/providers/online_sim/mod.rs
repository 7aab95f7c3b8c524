//! OnlineSim provider implementation.

pub mod client;
pub mod errors;
pub mod provider;
pub mod types;

pub use client::OnlineSimClient;
pub use errors::{OnlineSimError, OnlineSimErrorCode};
pub use provider::OnlineSimProvider;
