//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sms_provisioner::handoff::SessionError;
use sms_provisioner::{
    Balance, Country, InMemoryOrderStore, Order, OrderId, OrderSnapshot, OrderStatus, PhoneNumber,
    ProviderAdapter, ProviderError, ProviderId, ProviderRegistry, ProvisioningService, ProxyId,
    ProxyPool, SessionCreator, SessionId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory vendor with scripted check results and call counters.
pub struct MockVendor {
    id: ProviderId,
    pub stock: u32,
    pub balance: f64,
    pub price: f64,
    pub activation_delay: Option<chrono::Duration>,
    /// Latency of the cancel and finish endpoints.
    pub close_delay: Option<Duration>,
    codes: Mutex<HashMap<OrderId, OrderSnapshot>>,
    down: AtomicBool,
    next: AtomicUsize,
    pub checks: AtomicUsize,
    pub cancels: AtomicUsize,
    pub finishes: AtomicUsize,
}

impl MockVendor {
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::new(id),
            stock: 10,
            balance: 100.0,
            price: 12.5,
            activation_delay: None,
            close_delay: None,
            codes: Mutex::new(HashMap::new()),
            down: AtomicBool::new(false),
            next: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            finishes: AtomicUsize::new(0),
        }
    }

    /// Vendor whose cancel and finish calls take `delay`.
    pub fn slow_close(id: &str, delay: Duration) -> Self {
        Self {
            close_delay: Some(delay),
            ..Self::new(id)
        }
    }

    /// Answer the next checks of `order` with `snapshot`.
    pub fn report(&self, order: &OrderId, snapshot: OrderSnapshot) {
        self.codes.lock().unwrap().insert(order.clone(), snapshot);
    }

    pub fn deliver(&self, order: &OrderId, code: &str) {
        self.codes
            .lock()
            .unwrap()
            .insert(order.clone(), OrderSnapshot::received(code));
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn close_latency(&self) {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn up(&self) -> Result<(), ProviderError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ProviderError::unavailable(
                &self.id,
                std::io::Error::other("503 Service Unavailable"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockVendor {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn list_countries(&self) -> Result<Vec<Country>, ProviderError> {
        self.up()?;
        Ok(vec![Country {
            provider: self.id.clone(),
            code: "US".to_string(),
            iso_hint: Some("US".to_string()),
            display_name: "United States".to_string(),
            unit_price: self.price,
            currency: "USD".to_string(),
            available_count: self.stock,
            operator: "any".to_string(),
        }])
    }

    async fn get_balance(&self) -> Result<Balance, ProviderError> {
        self.up()?;
        Ok(Balance {
            provider: self.id.clone(),
            amount: self.balance,
            currency: "USD".to_string(),
        })
    }

    async fn purchase(
        &self,
        country_code: &str,
        _operator: Option<&str>,
    ) -> Result<Order, ProviderError> {
        self.up()?;
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let mut order = Order::pending(
            self.id.clone(),
            OrderId::new(format!("{}-{n}", self.id)),
            country_code,
            PhoneNumber::new(format!("+1202555{n:04}")).unwrap(),
            self.price,
        );
        order.available_at = self.activation_delay.map(|d| chrono::Utc::now() + d);
        Ok(order)
    }

    async fn check_code(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.up()?;
        Ok(self
            .codes
            .lock()
            .unwrap()
            .get(order)
            .cloned()
            .unwrap_or(OrderSnapshot::status(OrderStatus::Waiting)))
    }

    async fn cancel(&self, _order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.close_latency().await;
        self.up()?;
        Ok(OrderSnapshot::status(OrderStatus::Canceled))
    }

    async fn finish(&self, _order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        self.close_latency().await;
        self.up()?;
        Ok(OrderSnapshot::status(OrderStatus::Finished))
    }

    async fn report_abuse(&self, _order: &OrderId) -> Result<(), ProviderError> {
        self.up()
    }
}

/// Session creator that can be told to fail.
#[derive(Default)]
pub struct MockSessions {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
}

impl MockSessions {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SessionCreator for MockSessions {
    async fn create_session(
        &self,
        phone: &PhoneNumber,
        proxy: &ProxyId,
    ) -> Result<SessionId, SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError::Rejected("login refused".to_string()));
        }
        Ok(SessionId::new(format!("{phone}@{proxy}")))
    }
}

/// Service over one vendor, an in-memory store and `pool`.
pub fn service_with(
    vendor: Arc<MockVendor>,
    pool: ProxyPool,
    sessions: Arc<MockSessions>,
) -> ProvisioningService {
    ProvisioningService::builder(
        Arc::new(ProviderRegistry::new().with_provider(vendor)),
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(pool),
        sessions,
    )
    .build()
}
