//! Admission behaviour of the fixed window limiter.

mod common;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Barrier;

use common::{limiter_with, memory_limiter, UnreachableStore};
use tollgate::error::TollgateError;
use tollgate::ratelimit::{
    Admission, FailureMode, FixedWindow, IdentityDimension, InMemoryStore, Policy,
    RequestAttributes,
};

fn client(last: u8) -> RequestAttributes {
    RequestAttributes::new().with_remote_addr(IpAddr::V4(Ipv4Addr::new(203, 0, 113, last)))
}

#[tokio::test]
async fn test_five_per_minute_rejects_sixth() {
    let limiter = memory_limiter(5, Duration::from_millis(60_000));
    let attrs = client(1);

    for i in 1..=5 {
        assert!(
            limiter.check(&attrs).await.is_allowed(),
            "Request {} should be allowed",
            i
        );
    }

    let admission = limiter.check(&attrs).await;
    match admission {
        Admission::Reject(decision) => {
            assert_eq!(decision.remaining, Some(0));
            assert!(!decision.degraded);
            assert!(decision.reset_after.is_some());
        }
        Admission::Proceed(_) => panic!("6th request should be rejected"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_window_resets_after_expiry() {
    let limiter = memory_limiter(2, Duration::from_secs(60));
    let attrs = client(1);

    assert!(limiter.check(&attrs).await.is_allowed());
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(limiter.check(&attrs).await.is_allowed());
    assert!(!limiter.check(&attrs).await.is_allowed());

    // Window is measured from the first request, not the last
    tokio::time::advance(Duration::from_secs(30)).await;
    let admission = limiter.check(&attrs).await;
    assert!(admission.is_allowed());
    assert_eq!(admission.decision().remaining, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_window_stays_closed_until_expiry() {
    let limiter = memory_limiter(1, Duration::from_secs(10));
    let attrs = client(1);

    assert!(limiter.check(&attrs).await.is_allowed());
    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!limiter.check(&attrs).await.is_allowed());
    }

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(limiter.check(&attrs).await.is_allowed());
}

#[tokio::test]
async fn test_distinct_identities_do_not_interfere() {
    let limiter = memory_limiter(3, Duration::from_secs(60));

    for _ in 0..3 {
        assert!(limiter.check(&client(1)).await.is_allowed());
    }
    assert!(!limiter.check(&client(1)).await.is_allowed());

    for _ in 0..3 {
        assert!(limiter.check(&client(2)).await.is_allowed());
    }
    assert!(!limiter.check(&client(2)).await.is_allowed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_requests_admit_exactly_limit() {
    const LIMIT: u64 = 10;
    const CONCURRENT: usize = 64;

    let limiter = memory_limiter(LIMIT, Duration::from_secs(60));
    let barrier = Arc::new(Barrier::new(CONCURRENT));

    let tasks = (0..CONCURRENT).map(|_| {
        let limiter = limiter.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            limiter.check(&client(1)).await.is_allowed()
        })
    });

    let results = join_all(tasks).await;
    let allowed = results
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .filter(|allowed| *allowed)
        .count();

    assert_eq!(allowed as u64, LIMIT);
}

#[tokio::test]
async fn test_unreachable_store_fails_open() {
    let limiter = limiter_with(
        Arc::new(UnreachableStore),
        IdentityDimension::Ip,
        1,
        Duration::from_secs(60),
        FailureMode::Open,
    );

    for _ in 0..20 {
        let admission = limiter.check(&client(1)).await;
        assert!(admission.is_allowed());
        assert!(admission.decision().degraded);
    }
}

#[tokio::test]
async fn test_unreachable_store_fails_closed_when_configured() {
    let limiter = limiter_with(
        Arc::new(UnreachableStore),
        IdentityDimension::Ip,
        100,
        Duration::from_secs(60),
        FailureMode::Closed,
    );

    assert!(!limiter.check(&client(1)).await.is_allowed());
}

#[test]
fn test_invalid_policy_rejected_at_construction() {
    let zero_limit = Policy::builder()
        .window(Duration::from_millis(60_000))
        .limit(0)
        .strategy(Arc::new(FixedWindow::new()))
        .store(Arc::new(InMemoryStore::new()))
        .build();
    assert!(matches!(zero_limit, Err(TollgateError::Config(_))));

    let zero_window = Policy::builder()
        .window(Duration::from_millis(0))
        .limit(5)
        .strategy(Arc::new(FixedWindow::new()))
        .store(Arc::new(InMemoryStore::new()))
        .build();
    assert!(matches!(zero_window, Err(TollgateError::Config(_))));
}
