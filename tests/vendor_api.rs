//! Smoke tests against the live vendor APIs.
//!
//! These tests make real API calls and need valid API keys. They are
//! ignored by default and only read the catalog and balance, so they spend
//! no credits.
//!
//! # Setup
//!
//! Put the keys in a `.env` file or pass them directly:
//! ```bash
//! FIVE_SIM_API_KEY=... SMS_ACTIVATE_API_KEY=... ONLINE_SIM_API_KEY=... \
//!     cargo test --test vendor_api -- --ignored
//! ```
//!
//! A test whose key is missing prints a notice and returns.

#![cfg(all(feature = "five-sim", feature = "sms-activate", feature = "online-sim"))]

use sms_provisioner::five_sim::{FiveSimClient, FiveSimProvider};
use sms_provisioner::online_sim::{OnlineSimClient, OnlineSimProvider};
use sms_provisioner::sms_activate::{SmsActivateClient, SmsActivateProvider};
use sms_provisioner::{ProviderAdapter, ProviderRegistry, RetryConfig, RetryableAdapter};
use std::env;
use std::sync::Arc;
use std::time::Duration;

fn api_key(var: &str) -> Option<String> {
    dotenvy::dotenv().ok();
    let key = env::var(var).ok().filter(|k| !k.trim().is_empty());
    if key.is_none() {
        println!("{var} not set, skipping");
    }
    key
}

fn retry_config() -> RetryConfig {
    RetryConfig::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(5))
        .with_max_retries(3)
}

async fn assert_catalog_and_balance(adapter: &dyn ProviderAdapter) {
    let balance = adapter.get_balance().await.expect("balance request failed");
    println!("{}: balance {} {}", adapter.id(), balance.amount, balance.currency);
    assert!(balance.amount >= 0.0);

    let countries = adapter
        .list_countries()
        .await
        .expect("catalog request failed");
    println!("{}: {} catalog entries", adapter.id(), countries.len());
    assert!(!countries.is_empty(), "catalog should not be empty");
    for country in &countries {
        assert_eq!(country.provider, *adapter.id());
        assert!(country.unit_price >= 0.0, "negative price for {}", country.code);
    }
}

#[tokio::test]
#[ignore = "requires FIVE_SIM_API_KEY"]
async fn test_five_sim_catalog_and_balance() {
    let Some(key) = api_key("FIVE_SIM_API_KEY") else {
        return;
    };
    let client = FiveSimClient::with_api_key(key).expect("Failed to create client");
    let adapter = RetryableAdapter::with_config(FiveSimProvider::new(client), retry_config());
    assert_catalog_and_balance(&adapter).await;
}

#[tokio::test]
#[ignore = "requires SMS_ACTIVATE_API_KEY"]
async fn test_sms_activate_catalog_and_balance() {
    let Some(key) = api_key("SMS_ACTIVATE_API_KEY") else {
        return;
    };
    let client = SmsActivateClient::with_api_key(key).expect("Failed to create client");
    let adapter = RetryableAdapter::with_config(SmsActivateProvider::new(client), retry_config());
    assert_catalog_and_balance(&adapter).await;
}

#[tokio::test]
#[ignore = "requires ONLINE_SIM_API_KEY"]
async fn test_online_sim_catalog_and_balance() {
    let Some(key) = api_key("ONLINE_SIM_API_KEY") else {
        return;
    };
    let client = OnlineSimClient::with_api_key(key).expect("Failed to create client");
    let adapter = RetryableAdapter::with_config(OnlineSimProvider::new(client), retry_config());
    assert_catalog_and_balance(&adapter).await;
}

/// Every configured vendor through one registry; one vendor failing must
/// not hide the others.
#[tokio::test]
#[ignore = "requires at least one vendor API key"]
async fn test_registry_fan_out() {
    let mut registry = ProviderRegistry::new();
    if let Some(key) = api_key("FIVE_SIM_API_KEY") {
        let client = FiveSimClient::with_api_key(key).expect("Failed to create client");
        registry = registry.with_provider(Arc::new(FiveSimProvider::new(client)));
    }
    if let Some(key) = api_key("SMS_ACTIVATE_API_KEY") {
        let client = SmsActivateClient::with_api_key(key).expect("Failed to create client");
        registry = registry.with_provider(Arc::new(SmsActivateProvider::new(client)));
    }
    if let Some(key) = api_key("ONLINE_SIM_API_KEY") {
        let client = OnlineSimClient::with_api_key(key).expect("Failed to create client");
        registry = registry.with_provider(Arc::new(OnlineSimProvider::new(client)));
    }

    let providers = registry.ids().await.len();
    if providers == 0 {
        return;
    }

    let balances = registry.list_balances().await;
    for error in &balances.failures {
        println!("{error}");
    }
    assert_eq!(balances.items.len() + balances.failures.len(), providers);
}
