//! End-to-end order lifecycle through the provisioning service.

mod common;

use common::{MockSessions, MockVendor, service_with};
use sms_provisioner::{
    OrderKey, OrderSnapshot, OrderStatus, ProviderError, ProviderId, ProvisioningService,
    ProxyPool, ProxyServer, RegionPreference, ServiceError, SmsCode,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_purchase_happy_path() {
    let mut vendor = MockVendor::new("A");
    vendor.activation_delay = Some(chrono::Duration::milliseconds(200));
    let vendor = Arc::new(vendor);
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());

    let order = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.iso_hint.as_deref(), Some("US"));

    // Still inside the activation delay: nothing is checked
    let report = service.poller().tick().await;
    assert_eq!(report.checked, 0);
    assert_eq!(MockVendor::calls(&vendor.checks), 0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let report = service.poller().tick().await;
    assert_eq!(report.promoted, 1);
    let waiting = service.store().get(&order.key()).await.unwrap();
    assert_eq!(waiting.status, OrderStatus::Waiting);

    vendor.deliver(&order.id, "482913");
    let report = service.poller().tick().await;
    assert_eq!(report.received, 1);

    let received = service.store().get(&order.key()).await.unwrap();
    assert_eq!(received.status, OrderStatus::Received);
    assert_eq!(received.verification_code, Some(SmsCode::new("482913")));
}

#[tokio::test]
async fn test_purchase_failures_create_no_order() {
    let mut broke = MockVendor::new("A");
    broke.balance = 1.0;
    let service = service_with(Arc::new(broke), ProxyPool::default(), Arc::default());

    let err = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Provider(ProviderError::InsufficientFunds { .. })
    ));

    let mut empty = MockVendor::new("A");
    empty.stock = 0;
    let empty_service = service_with(Arc::new(empty), ProxyPool::default(), Arc::default());
    let err = empty_service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Provider(ProviderError::OutOfStock { .. })
    ));

    assert!(service.store().list().await.is_empty());
    assert!(empty_service.store().list().await.is_empty());
}

#[tokio::test]
async fn test_double_cancel_is_rejected() {
    let vendor = Arc::new(MockVendor::new("A"));
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
    let order = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap();
    service.poller().tick().await;

    let canceled = service.cancel(&order.key()).await.unwrap();
    assert_eq!(canceled.status, OrderStatus::Canceled);

    let second = service.cancel(&order.key()).await.unwrap_err();
    assert!(second.is_invalid_transition());
    assert_eq!(MockVendor::calls(&vendor.cancels), 1);
}

#[tokio::test]
async fn test_check_is_idempotent_once_code_is_held() {
    let vendor = Arc::new(MockVendor::new("A"));
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
    let order = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap();
    vendor.deliver(&order.id, "482913");

    let first = service.check_now(&order.key()).await.unwrap();
    let calls_after_first = MockVendor::calls(&vendor.checks);
    let second = service.check_now(&order.key()).await.unwrap();

    assert_eq!(
        (first.status, first.verification_code),
        (second.status, second.verification_code)
    );
    assert_eq!(MockVendor::calls(&vendor.checks), calls_after_first);

    // The poller leaves it alone too
    let report = service.poller().tick().await;
    assert_eq!(report.checked, 0);
}

#[tokio::test]
async fn test_code_is_never_overwritten() {
    let vendor = Arc::new(MockVendor::new("A"));
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
    let order = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap();

    vendor.deliver(&order.id, "482913");
    service.check_now(&order.key()).await.unwrap();
    vendor.deliver(&order.id, "000000");
    let after = service.check_now(&order.key()).await.unwrap();

    assert_eq!(after.verification_code, Some(SmsCode::new("482913")));
}

#[tokio::test]
async fn test_explicit_operations_follow_lattice() {
    fn allowed(action: &str, from: OrderStatus) -> bool {
        match action {
            "finish" => from == OrderStatus::Received,
            _ => matches!(from, OrderStatus::Waiting | OrderStatus::Received),
        }
    }

    for name in ["cancel", "finish", "abuse"] {
        for with_code in [false, true] {
            let vendor = Arc::new(MockVendor::new("A"));
            let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
            let order = service
                .purchase(&ProviderId::new("A"), "US", None)
                .await
                .unwrap();
            if with_code {
                vendor.deliver(&order.id, "482913");
            }
            service.poller().tick().await;

            let key = order.key();
            let before = service.store().get(&key).await.unwrap().status;
            let result = match name {
                "cancel" => service.cancel(&key).await,
                "finish" => service.finish(&key).await,
                _ => service.report_abuse(&key).await,
            };

            assert_eq!(result.is_ok(), allowed(name, before), "{name} from {before}");
            let after = service.store().get(&key).await.unwrap().status;
            assert!(
                after == before || before.can_transition_to(after),
                "{name}: {before} -> {after} is not a lattice edge"
            );

            // Nothing moves out of a terminal status
            if after.is_terminal() {
                for retry in [service.cancel(&key).await, service.finish(&key).await] {
                    assert!(retry.unwrap_err().is_invalid_transition());
                }
            }
        }
    }
}

#[tokio::test]
async fn test_handoff_after_reconciliation() {
    let vendor = Arc::new(MockVendor::new("A"));
    let pool = ProxyPool::default().with_proxies([ProxyServer::new("us-1", "us", "10.0.0.1:3128", 1)]);
    let service = service_with(vendor.clone(), pool, Arc::new(MockSessions::default()));

    let order = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap();

    let early = service
        .handoff(&order.key(), &RegionPreference::Automatic)
        .await;
    assert!(early.is_err());

    vendor.deliver(&order.id, "482913");
    service.poller().tick().await;

    let handoff = service
        .handoff(&order.key(), &RegionPreference::Automatic)
        .await
        .unwrap();
    assert_eq!(handoff.assignment.proxy_id.as_str(), "us-1");
    assert!(handoff.order.consumed_at.is_some());

    // Consumed orders can still be finished at the vendor
    let finished = service.finish(&order.key()).await.unwrap();
    assert_eq!(finished.status, OrderStatus::Finished);
}

async fn waiting(service: &ProvisioningService) -> OrderKey {
    let order = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap();
    service.poller().tick().await;
    order.key()
}

#[tokio::test]
async fn test_concurrent_cancels_reach_vendor_once() {
    let vendor = Arc::new(MockVendor::slow_close("A", Duration::from_millis(50)));
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
    let key = waiting(&service).await;

    let (first, second) = tokio::join!(service.cancel(&key), service.cancel(&key));

    let (ok, err): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(Result::is_ok);
    assert_eq!(ok.len(), 1);
    assert!(err[0].as_ref().unwrap_err().is_invalid_transition());
    assert_eq!(MockVendor::calls(&vendor.cancels), 1);
    let stored = service.store().get(&key).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Canceled);
}

#[tokio::test]
async fn test_finish_racing_cancel_calls_one_endpoint() {
    let vendor = Arc::new(MockVendor::slow_close("A", Duration::from_millis(50)));
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
    let order = service
        .purchase(&ProviderId::new("A"), "US", None)
        .await
        .unwrap();
    vendor.deliver(&order.id, "482913");
    service.poller().tick().await;
    let key = order.key();

    let (finished, canceled) = tokio::join!(service.finish(&key), service.cancel(&key));

    assert!(finished.is_ok() != canceled.is_ok());
    let vendor_calls = MockVendor::calls(&vendor.finishes) + MockVendor::calls(&vendor.cancels);
    assert_eq!(vendor_calls, 1);

    let winner = finished.or(canceled).unwrap();
    let stored = service.store().get(&key).await.unwrap();
    assert_eq!(stored.status, winner.status);
    assert_eq!(stored.verification_code, Some(SmsCode::new("482913")));
}

#[tokio::test]
async fn test_cancel_racing_poller_keeps_code() {
    let vendor = Arc::new(MockVendor::slow_close("A", Duration::from_millis(50)));
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
    let key = waiting(&service).await;

    // The code lands while the cancel is at the vendor
    let (canceled, report) = tokio::join!(service.cancel(&key), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        vendor.deliver(&key.id, "482913");
        service.poller().tick().await
    });

    assert_eq!(report.received, 1);
    let canceled = canceled.unwrap();
    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert_eq!(canceled.verification_code, Some(SmsCode::new("482913")));
}

#[tokio::test]
async fn test_cancel_already_closed_by_poller_is_rejected() {
    let vendor = Arc::new(MockVendor::slow_close("A", Duration::from_millis(50)));
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
    let key = waiting(&service).await;

    let (canceled, report) = tokio::join!(service.cancel(&key), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        vendor.report(&key.id, OrderSnapshot::status(OrderStatus::Canceled));
        service.poller().tick().await
    });

    assert_eq!(report.closed, 1);
    assert!(canceled.unwrap_err().is_invalid_transition());
    assert_eq!(MockVendor::calls(&vendor.cancels), 1);
    let stored = service.store().get(&key).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Canceled);
}

#[tokio::test]
async fn test_vendor_finish_with_code_is_recorded() {
    let vendor = Arc::new(MockVendor::new("A"));
    let service = service_with(vendor.clone(), ProxyPool::default(), Arc::default());
    let key = waiting(&service).await;

    vendor.report(
        &key.id,
        OrderSnapshot {
            status: OrderStatus::Finished,
            code: Some(SmsCode::new("482913")),
        },
    );
    let report = service.poller().tick().await;
    assert_eq!(report.received, 1);

    let stored = service.store().get(&key).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Finished);
    assert_eq!(stored.verification_code, Some(SmsCode::new("482913")));

    let checks = MockVendor::calls(&vendor.checks);
    assert_eq!(service.poller().tick().await.checked, 0);
    assert_eq!(MockVendor::calls(&vendor.checks), checks);
}
