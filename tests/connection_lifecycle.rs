//! Connection manager lifecycle under concurrency and outages.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use kvgate::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use kvgate::store::MemoryStore;
use kvgate::security::{RateLimitPolicy, RateLimiter};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_initialize_connects_once() {
    let (store, manager) = common::memory_manager();
    store.set_connect_delay(Some(Duration::from_millis(50)));

    let calls = (0..16).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.initialize().await })
    });
    for result in join_all(calls).await {
        result.unwrap().expect("initialize should succeed");
    }

    assert_eq!(store.connect_attempts(), 1);
    assert_eq!(manager.state(), ConnectionState::Ready);

    // Initializing again while ready is a no-op.
    manager.initialize().await.unwrap();
    assert_eq!(store.connect_attempts(), 1);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failing_initialize_connects_once() {
    let store = MemoryStore::new();
    store.refuse_connections(true);
    store.set_connect_delay(Some(Duration::from_millis(100)));
    let mut settings = common::fast_settings();
    settings.connect_timeout = Duration::from_secs(1);
    // Park the supervisor so only callers drive attempts.
    settings.reconnect.step_ms = 60_000;
    settings.reconnect.max_delay_ms = 60_000;
    let manager = ConnectionManager::new(Arc::new(store.clone()), settings);

    let started = tokio::time::Instant::now();
    let calls = (0..8).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.initialize().await })
    });
    let results = join_all(calls).await;

    assert!(results.into_iter().all(|r| r.unwrap().is_err()));
    assert_eq!(store.connect_attempts(), 1);
    assert!(started.elapsed() < Duration::from_millis(500));

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_shutdown_ends_once() {
    let (_store, manager) = common::ready_manager().await;
    let mut events = manager.subscribe();

    let calls = (0..8).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.shutdown().await })
    });
    for result in join_all(calls).await {
        result.unwrap();
    }
    manager.shutdown().await;

    assert_eq!(manager.state(), ConnectionState::Ended);
    assert!(manager.connection().is_none());

    let mut ended = 0;
    while let Ok(event) = events.try_recv() {
        if let ConnectionEvent::Transition { to: ConnectionState::Ended, .. } = event {
            ended += 1;
        }
    }
    assert_eq!(ended, 1);
}

#[tokio::test]
async fn test_shutdown_without_initialize() {
    let (store, manager) = common::memory_manager();
    manager.shutdown().await;

    assert_eq!(manager.state(), ConnectionState::Ended);
    assert_eq!(store.connect_attempts(), 0);
    assert!(!manager.health_check().await);
    assert!(manager.initialize().await.is_err());
}

#[tokio::test]
async fn test_limiter_recovers_after_outage() {
    let (store, manager) = common::ready_manager().await;
    let limiter = RateLimiter::new(manager.clone());
    let policy = RateLimitPolicy::new(3, 60, "contact_form").unwrap();

    assert_eq!(limiter.check("1.2.3.4", &policy).await.unwrap().remaining, 2);

    store.refuse_connections(true);
    store.sever();
    let during = limiter.check("1.2.3.4", &policy).await.unwrap();
    assert!(!during.limited);
    assert_eq!(during.remaining, 3);
    assert_ne!(manager.state(), ConnectionState::Ready);

    store.refuse_connections(false);
    common::wait_for_state(&manager, ConnectionState::Ready).await;

    // The counter written before the outage survived in the store.
    let after = limiter.check("1.2.3.4", &policy).await.unwrap();
    assert_eq!(after.remaining, 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_failed_self_test_is_not_ready() {
    let (store, manager) = common::memory_manager();
    store.fail_self_test(true);

    assert!(manager.initialize().await.is_err());
    assert_ne!(manager.state(), ConnectionState::Ready);
    assert!(manager.connection().is_none());

    store.fail_self_test(false);
    common::wait_for_state(&manager, ConnectionState::Ready).await;

    manager.shutdown().await;
}
