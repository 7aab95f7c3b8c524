//! Scripted adapter for unit tests.

use super::traits::{ProviderAdapter, ProviderError};
use crate::order::{Order, OrderSnapshot, OrderStatus};
use crate::types::{Balance, Country, OrderId, PhoneNumber, ProviderId};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub(crate) struct ScriptedAdapter {
    id: ProviderId,
    pub stock: u32,
    pub balance: f64,
    pub activation_delay: Option<Duration>,
    snapshots: Mutex<HashMap<OrderId, OrderSnapshot>>,
    unavailable: AtomicBool,
    pub purchases: AtomicUsize,
    pub checks: AtomicUsize,
    pub cancels: AtomicUsize,
    pub finishes: AtomicUsize,
    pub reports: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::new(id),
            stock: 5,
            balance: 100.0,
            activation_delay: None,
            snapshots: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            purchases: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            finishes: AtomicUsize::new(0),
            reports: AtomicUsize::new(0),
        }
    }

    pub fn set_snapshot(&self, id: &str, snapshot: OrderSnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(OrderId::new(id), snapshot);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn guard(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::unavailable(
                &self.id,
                std::io::Error::other("connection refused"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn list_countries(&self) -> Result<Vec<Country>, ProviderError> {
        self.guard()?;
        Ok(vec![Country {
            provider: self.id.clone(),
            code: "US".to_string(),
            iso_hint: Some("US".to_string()),
            display_name: "United States".to_string(),
            unit_price: 10.0,
            currency: "RUB".to_string(),
            available_count: self.stock,
            operator: "any".to_string(),
        }])
    }

    async fn get_balance(&self) -> Result<Balance, ProviderError> {
        self.guard()?;
        Ok(Balance {
            provider: self.id.clone(),
            amount: self.balance,
            currency: "RUB".to_string(),
        })
    }

    async fn purchase(
        &self,
        country_code: &str,
        _operator: Option<&str>,
    ) -> Result<Order, ProviderError> {
        self.guard()?;
        let n = self.purchases.fetch_add(1, Ordering::SeqCst) + 1;
        let mut order = Order::pending(
            self.id.clone(),
            OrderId::new(n.to_string()),
            country_code,
            PhoneNumber::new(format!("+1415555{n:04}")).unwrap(),
            10.0,
        );
        order.available_at = self.activation_delay.map(|d| Utc::now() + d);
        Ok(order)
    }

    async fn check_code(&self, order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .get(order)
            .cloned()
            .unwrap_or(OrderSnapshot::status(OrderStatus::Waiting)))
    }

    async fn cancel(&self, _order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        Ok(OrderSnapshot::status(OrderStatus::Canceled))
    }

    async fn finish(&self, _order: &OrderId) -> Result<OrderSnapshot, ProviderError> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        Ok(OrderSnapshot::status(OrderStatus::Finished))
    }

    async fn report_abuse(&self, _order: &OrderId) -> Result<(), ProviderError> {
        self.reports.fetch_add(1, Ordering::SeqCst);
        self.guard()
    }
}
