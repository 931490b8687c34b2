//! Fixed-window behaviour of the rate limiter against the in-memory store.

use std::time::Duration;

use futures_util::future::join_all;
use kvgate::security::{RateLimitPolicy, RateLimiter};

mod common;

#[tokio::test]
async fn test_remaining_counts_down_then_limits() {
    let (_store, manager) = common::ready_manager().await;
    let limiter = RateLimiter::new(manager.clone());
    let policy = RateLimitPolicy::new(5, 60, "t").unwrap();

    for expected in (0..5).rev() {
        let decision = limiter.check("1.2.3.4", &policy).await.unwrap();
        assert!(!decision.limited);
        assert_eq!(decision.remaining, expected);
    }

    let decision = limiter.check("1.2.3.4", &policy).await.unwrap();
    assert!(decision.limited);
    assert_eq!(decision.remaining, 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_identifiers_do_not_interfere() {
    let (_store, manager) = common::ready_manager().await;
    let limiter = RateLimiter::new(manager.clone());
    let policy = RateLimitPolicy::new(2, 60, "t").unwrap();

    for _ in 0..3 {
        limiter.check("alice", &policy).await.unwrap();
    }
    let bob = limiter.check("bob", &policy).await.unwrap();
    assert!(!bob.limited);
    assert_eq!(bob.remaining, 1);

    // Same identifier under another prefix is a separate counter too.
    let other = RateLimitPolicy::new(2, 60, "other").unwrap();
    assert_eq!(limiter.check("alice", &other).await.unwrap().remaining, 1);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_window_resets_after_expiry() {
    let (store, manager) = common::ready_manager().await;
    let limiter = RateLimiter::new(manager.clone());
    let policy = RateLimitPolicy::new(2, 60, "t").unwrap();

    for _ in 0..3 {
        limiter.check("1.2.3.4", &policy).await.unwrap();
    }
    assert!(limiter.check("1.2.3.4", &policy).await.unwrap().limited);

    tokio::time::advance(Duration::from_secs(61)).await;

    let decision = limiter.check("1.2.3.4", &policy).await.unwrap();
    assert!(!decision.limited);
    assert_eq!(decision.remaining, 1);
    assert!(store.key_ttl("t:1.2.3.4").is_some());

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_steady_traffic_does_not_extend_window() {
    let (store, manager) = common::ready_manager().await;
    let limiter = RateLimiter::new(manager.clone());
    let policy = RateLimitPolicy::new(1_000, 60, "t").unwrap();

    limiter.check("steady", &policy).await.unwrap();
    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(10)).await;
        let decision = limiter.check("steady", &policy).await.unwrap();
        assert!(decision.reset_after.unwrap() <= Duration::from_secs(60));
    }

    let ttl = store.key_ttl("t:steady").unwrap();
    assert!(ttl <= Duration::from_secs(10), "ttl was pushed forward: {ttl:?}");

    tokio::time::advance(Duration::from_secs(11)).await;
    let fresh = limiter.check("steady", &policy).await.unwrap();
    assert_eq!(fresh.remaining, 999);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_lose_no_increments() {
    let (_store, manager) = common::ready_manager().await;
    let limiter = RateLimiter::new(manager.clone());
    let policy = RateLimitPolicy::new(10, 60, "burst").unwrap();

    let calls = (0..20).map(|_| {
        let limiter = limiter.clone();
        let policy = policy.clone();
        tokio::spawn(async move { limiter.check("1.2.3.4", &policy).await.unwrap() })
    });
    let decisions: Vec<_> = join_all(calls)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let allowed = decisions.iter().filter(|d| !d.limited).count();
    let limited = decisions.iter().filter(|d| d.limited).count();
    assert_eq!(allowed, 10);
    assert_eq!(limited, 10);

    let mut remaining: Vec<_> = decisions
        .iter()
        .filter(|d| !d.limited)
        .map(|d| d.remaining)
        .collect();
    remaining.sort_unstable();
    assert_eq!(remaining, (0..10).collect::<Vec<_>>());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_severed_connection_fails_open() {
    let (store, manager) = common::ready_manager().await;
    let limiter = RateLimiter::new(manager.clone());
    let policy = RateLimitPolicy::new(1, 60, "t").unwrap();

    limiter.check("1.2.3.4", &policy).await.unwrap();
    store.refuse_connections(true);
    store.sever();

    let decision = limiter.check("1.2.3.4", &policy).await.unwrap();
    assert!(!decision.limited);
    assert_eq!(decision.remaining, 1);
    assert!(!manager.health_check().await);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_contact_form_scenario() {
    let (_store, manager) = common::ready_manager().await;
    let limiter = RateLimiter::new(manager.clone());
    let policy = RateLimitPolicy::new(10, 60, "contact_form").unwrap();

    for _ in 0..10 {
        let decision = limiter.check("1.2.3.4", &policy).await.unwrap();
        assert!(!decision.limited);
        tokio::time::advance(Duration::from_millis(500)).await;
    }

    let rejected = limiter.check("1.2.3.4", &policy).await.unwrap();
    assert!(rejected.limited);
    assert_eq!(rejected.remaining, 0);

    // t = 61s after the first call.
    tokio::time::advance(Duration::from_secs(56)).await;
    let again = limiter.check("1.2.3.4", &policy).await.unwrap();
    assert!(!again.limited);
    assert_eq!(again.remaining, 9);

    manager.shutdown().await;
}
