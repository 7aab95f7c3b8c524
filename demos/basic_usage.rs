//! Buy a number from 5sim, wait for its code, and hand it to a session.
//!
//! # Running
//!
//! ```bash
//! FIVE_SIM_API_KEY=your_api_key \
//! SESSION_ENDPOINT=http://127.0.0.1:8080/sessions \
//! cargo run --example basic_usage
//! ```

use sms_provisioner::five_sim::{FiveSimClient, FiveSimProvider};
use sms_provisioner::{
    HttpSessionCreator, InMemoryOrderStore, OrderStatus, ProviderId, ProviderRegistry,
    ProvisioningService, ProxyPool, ProxyServer, RegionPreference,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let api_key = env::var("FIVE_SIM_API_KEY")?;
    let endpoint =
        env::var("SESSION_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:8080/sessions".into());

    let provider = FiveSimProvider::new(FiveSimClient::with_api_key(api_key)?);
    let registry = Arc::new(ProviderRegistry::new().with_provider(Arc::new(provider)));

    // One proxy per region; the number's country picks the region
    let pool = ProxyPool::default().with_proxies([
        ProxyServer::new("gb-1", "gb", "10.0.0.1:3128", 4),
        ProxyServer::new("us-1", "us", "10.0.1.1:3128", 4),
    ]);

    let service = ProvisioningService::builder(
        registry,
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(pool),
        Arc::new(HttpSessionCreator::new(&endpoint)?),
    )
    .build();

    let token = CancellationToken::new();
    let tasks = service.start(token.clone());

    let balances = service.list_balances().await;
    for balance in &balances.items {
        println!("{}: {:.2} {}", balance.provider, balance.amount, balance.currency);
    }

    println!("Buying an England number...");
    let order = service
        .purchase(&ProviderId::new("5sim"), "england", None)
        .await?;
    println!("Got {} (order {})", order.phone_number, order.id);

    // The background poller reconciles the order with the vendor
    let key = order.key();
    let order = loop {
        let order = service.store().get(&key).await?;
        if order.status != OrderStatus::Pending && order.status != OrderStatus::Waiting {
            break order;
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
    };

    if order.status != OrderStatus::Received {
        println!("Order closed without a code: {}", order.status);
        token.cancel();
        tasks.join().await;
        return Ok(());
    }

    let handoff = service
        .handoff(&key, &RegionPreference::Automatic)
        .await?;
    println!(
        "Session {} on proxy {} ({})",
        handoff.session_id, handoff.assignment.proxy_id, handoff.assignment.reason
    );

    service.finish(&key).await?;

    token.cancel();
    tasks.join().await;
    Ok(())
}
