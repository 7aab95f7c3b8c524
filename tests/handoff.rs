//! Handoff of verified numbers to messaging sessions.

mod common;

use common::{MockSessions, MockVendor, service_with};
use futures::future::join_all;
use sms_provisioner::{
    AssignmentReason, HandoffError, OrderKey, OrderStatus, ProviderId, ProvisioningService,
    ProxyError, ProxyId, ProxyPool, ProxyServer, RegionPreference, ServiceError,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

async fn received(service: &ProvisioningService, vendor: &MockVendor) -> OrderKey {
    let order = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap();
    vendor.deliver(&order.id, "482913");
    let order = service.check_now(&order.key()).await.unwrap();
    assert_eq!(order.status, OrderStatus::Received);
    order.key()
}

fn us_pool(capacity: u32) -> ProxyPool {
    ProxyPool::default().with_proxies([ProxyServer::new("us-1", "us", "10.0.2.1:3128", capacity)])
}

#[tokio::test]
async fn test_concurrent_handoffs_create_one_session() {
    let vendor = Arc::new(MockVendor::new("A"));
    let sessions = Arc::new(MockSessions::slow(Duration::from_millis(50)));
    let service = service_with(vendor.clone(), us_pool(10), sessions.clone());
    let key = received(&service, &vendor).await;

    let results = join_all((0..8).map(|_| service.handoff(&key, &RegionPreference::Automatic))).await;

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].assignment.reason, AssignmentReason::AutoRegionMatch);
    for loser in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(
            loser,
            ServiceError::Handoff(HandoffError::InProgress(_) | HandoffError::AlreadyConsumed(_))
        ));
    }

    assert_eq!(sessions.calls.load(Ordering::SeqCst), 1);
    let proxy = service.pool().proxy(&ProxyId::new("us-1")).await.unwrap();
    assert_eq!(proxy.active_sessions, 1);
}

#[tokio::test]
async fn test_failed_session_leaves_order_reusable() {
    let vendor = Arc::new(MockVendor::new("A"));
    let sessions = Arc::new(MockSessions::default());
    let service = service_with(vendor.clone(), us_pool(1), sessions.clone());
    let key = received(&service, &vendor).await;
    sessions.fail.store(true, Ordering::SeqCst);

    let err = service
        .handoff(&key, &RegionPreference::Automatic)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Handoff(HandoffError::PartialFailure { .. })
    ));

    let proxy = service.pool().proxy(&ProxyId::new("us-1")).await.unwrap();
    assert_eq!(proxy.active_sessions, 0);
    assert!(service.pool().assignment(&key).await.is_none());

    let order = service.store().get(&key).await.unwrap();
    assert_eq!(order.status, OrderStatus::Received);
    assert!(order.consumed_at.is_none());

    sessions.fail.store(false, Ordering::SeqCst);
    let handoff = service
        .handoff(&key, &RegionPreference::Automatic)
        .await
        .unwrap();
    assert_eq!(handoff.assignment.proxy_id, ProxyId::new("us-1"));
    assert_eq!(sessions.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_no_capacity_leaves_order_unconsumed() {
    let vendor = Arc::new(MockVendor::new("A"));
    let sessions = Arc::new(MockSessions::default());
    let service = service_with(vendor.clone(), us_pool(1), sessions.clone());
    let first = received(&service, &vendor).await;
    let second = received(&service, &vendor).await;

    service
        .handoff(&first, &RegionPreference::Automatic)
        .await
        .unwrap();
    let err = service
        .handoff(&second, &RegionPreference::Automatic)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Handoff(HandoffError::Proxy(ProxyError::NoCapacity))
    ));
    assert_eq!(sessions.calls.load(Ordering::SeqCst), 1);
    assert!(service.store().get(&second).await.unwrap().consumed_at.is_none());
}

#[tokio::test]
async fn test_terminal_order_cannot_be_handed_off() {
    let vendor = Arc::new(MockVendor::new("A"));
    let sessions = Arc::new(MockSessions::default());
    let service = service_with(vendor.clone(), us_pool(1), sessions.clone());
    let key = received(&service, &vendor).await;

    service.cancel(&key).await.unwrap();
    let err = service
        .handoff(&key, &RegionPreference::Automatic)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Handoff(HandoffError::NotConsumable {
            status: OrderStatus::Canceled,
            ..
        })
    ));
    assert_eq!(sessions.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_waits_for_running_handoff() {
    let vendor = Arc::new(MockVendor::new("A"));
    let sessions = Arc::new(MockSessions::slow(Duration::from_millis(50)));
    let service = service_with(vendor.clone(), us_pool(1), sessions.clone());
    let key = received(&service, &vendor).await;

    let (handoff, canceled) = tokio::join!(
        service.handoff(&key, &RegionPreference::Automatic),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            service.cancel(&key).await
        }
    );

    // The cancel lands only after the order was consumed
    let handoff = handoff.unwrap();
    assert!(handoff.order.consumed_at.is_some());
    let canceled = canceled.unwrap();
    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert_eq!(canceled.consumed_at, handoff.order.consumed_at);

    assert_eq!(sessions.calls.load(Ordering::SeqCst), 1);
    let proxy = service.pool().proxy(&ProxyId::new("us-1")).await.unwrap();
    assert_eq!(proxy.active_sessions, 1);
}

#[tokio::test]
async fn test_handoff_during_cancel_is_in_progress() {
    let vendor = Arc::new(MockVendor::slow_close("A", Duration::from_millis(50)));
    let sessions = Arc::new(MockSessions::default());
    let service = service_with(vendor.clone(), us_pool(1), sessions.clone());
    let key = received(&service, &vendor).await;

    let (canceled, handoff) = tokio::join!(service.cancel(&key), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.handoff(&key, &RegionPreference::Automatic).await
    });

    assert_eq!(canceled.unwrap().status, OrderStatus::Canceled);
    assert!(matches!(
        handoff.unwrap_err(),
        ServiceError::Handoff(HandoffError::InProgress(_))
    ));
    assert_eq!(sessions.calls.load(Ordering::SeqCst), 0);
    let proxy = service.pool().proxy(&ProxyId::new("us-1")).await.unwrap();
    assert_eq!(proxy.active_sessions, 0);
}
