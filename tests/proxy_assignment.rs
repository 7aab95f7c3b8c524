//! Proxy pool behavior under region policy, capacity and health changes.

use futures::future::join_all;
use sms_provisioner::{
    AssignmentReason, HealthStatus, OrderKey, ProxyError, ProxyId, ProxyPool, ProxyServer, Region,
    RegionPreference, RegionTable,
};
use std::sync::Arc;

fn key(n: usize) -> OrderKey {
    OrderKey::new("A", n.to_string())
}

#[tokio::test]
async fn test_automatic_falls_back_when_region_is_full() {
    let pool = ProxyPool::new(Arc::new(RegionTable::strict().with_region("eu", &["DE", "FR"])))
        .with_proxies([
            ProxyServer::new("eu-1", "eu", "10.0.1.1:3128", 1),
            ProxyServer::new("us-1", "us", "10.0.2.1:3128", 3),
        ]);

    let first = pool
        .assign(&key(1), &RegionPreference::Automatic, Some("de"))
        .await
        .unwrap();
    assert_eq!(first.reason, AssignmentReason::AutoRegionMatch);
    assert_eq!(first.region, Region::new("eu"));

    let second = pool
        .assign(&key(2), &RegionPreference::Automatic, Some("FR"))
        .await
        .unwrap();
    assert_eq!(second.reason, AssignmentReason::AutoFallback);
    assert_eq!(second.proxy_id, ProxyId::new("us-1"));

    // Strict table, unmapped country: no preferred region at all
    let third = pool
        .assign(&key(3), &RegionPreference::Automatic, Some("BR"))
        .await
        .unwrap();
    assert_eq!(third.reason, AssignmentReason::AutoFallback);
}

#[tokio::test]
async fn test_explicit_region_never_falls_back() {
    let pool = ProxyPool::default().with_proxies([
        ProxyServer::new("de-1", "de", "10.0.1.1:3128", 1),
        ProxyServer::new("us-1", "us", "10.0.2.1:3128", 5),
    ]);
    let germany = RegionPreference::Explicit(Region::new("de"));

    let first = pool.assign(&key(1), &germany, Some("US")).await.unwrap();
    assert_eq!(first.reason, AssignmentReason::Manual);
    assert_eq!(first.proxy_id, ProxyId::new("de-1"));

    let err = pool.assign(&key(2), &germany, Some("DE")).await.unwrap_err();
    assert!(matches!(err, ProxyError::NoCapacityInRegion(region) if region.as_str() == "de"));
    assert!(pool.assignment(&key(2)).await.is_none());
}

#[tokio::test]
async fn test_concurrent_assignments_respect_capacity() {
    let pool = Arc::new(ProxyPool::default().with_proxies([
        ProxyServer::new("us-1", "us", "10.0.2.1:3128", 3),
        ProxyServer::new("us-2", "us", "10.0.2.2:3128", 2),
    ]));

    let results = join_all((0..20).map(|n| {
        let pool = Arc::clone(&pool);
        async move {
            pool.assign(&key(n), &RegionPreference::Automatic, Some("US"))
                .await
        }
    }))
    .await;

    let granted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(granted, 5);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ProxyError::NoCapacity))
    );

    for proxy in pool.proxies().await {
        assert!(proxy.active_sessions <= proxy.capacity);
        assert_eq!(proxy.active_sessions, proxy.capacity);
    }
}

#[tokio::test]
async fn test_least_loaded_proxy_wins() {
    let pool = ProxyPool::default().with_proxies([
        ProxyServer::new("us-1", "us", "10.0.2.1:3128", 10),
        ProxyServer::new("us-2", "us", "10.0.2.2:3128", 10),
    ]);

    let mut picked = Vec::new();
    for n in 0..4 {
        let assignment = pool
            .assign(&key(n), &RegionPreference::Automatic, Some("US"))
            .await
            .unwrap();
        picked.push(assignment.proxy_id.as_str().to_string());
    }
    assert_eq!(picked, ["us-1", "us-2", "us-1", "us-2"]);
}

#[tokio::test]
async fn test_dead_proxy_is_excluded_while_assigning() {
    let pool = Arc::new(ProxyPool::default().with_proxies([
        ProxyServer::new("us-1", "us", "10.0.2.1:3128", 50),
        ProxyServer::new("us-2", "us", "10.0.2.2:3128", 50),
    ]));
    let dead = ProxyId::new("us-2");

    pool.set_health(&dead, HealthStatus::Dead).await.unwrap();
    let before = pool.proxy(&dead).await.unwrap().active_sessions;

    let results = join_all((0..10).map(|n| {
        let pool = Arc::clone(&pool);
        async move {
            pool.assign(&key(n), &RegionPreference::Automatic, Some("US"))
                .await
        }
    }))
    .await;

    for assignment in results {
        assert_eq!(assignment.unwrap().proxy_id, ProxyId::new("us-1"));
    }
    assert_eq!(pool.proxy(&dead).await.unwrap().active_sessions, before);
}

#[tokio::test]
async fn test_release_frees_the_slot() {
    let pool =
        ProxyPool::default().with_proxies([ProxyServer::new("us-1", "us", "10.0.2.1:3128", 1)]);

    pool.assign(&key(1), &RegionPreference::Automatic, Some("US"))
        .await
        .unwrap();
    assert!(matches!(
        pool.assign(&key(2), &RegionPreference::Automatic, Some("US"))
            .await,
        Err(ProxyError::NoCapacity)
    ));

    pool.release(&key(1)).await.unwrap();
    assert!(matches!(
        pool.release(&key(1)).await,
        Err(ProxyError::NotAssigned(_))
    ));

    let reassigned = pool
        .assign(&key(2), &RegionPreference::Automatic, Some("US"))
        .await
        .unwrap();
    assert_eq!(reassigned.proxy_id, ProxyId::new("us-1"));
}
