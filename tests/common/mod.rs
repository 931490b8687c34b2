//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use kvgate::config::ReconnectConfig;
use kvgate::connection::{ConnectionManager, ConnectionState, ManagerSettings};
use kvgate::store::MemoryStore;

/// Short timeouts and a fast reconnect policy.
pub fn fast_settings() -> ManagerSettings {
    ManagerSettings {
        connect_timeout: Duration::from_millis(500),
        keep_alive: Duration::from_secs(60),
        reconnect: ReconnectConfig {
            max_retries: 20,
            step_ms: 5,
            max_delay_ms: 25,
            ..ReconnectConfig::default()
        },
    }
}

/// A manager over a fresh in-memory store, not yet initialized.
pub fn memory_manager() -> (MemoryStore, Arc<ConnectionManager>) {
    let store = MemoryStore::new();
    let manager = ConnectionManager::new(Arc::new(store.clone()), fast_settings());
    (store, manager)
}

/// A ready manager over a fresh in-memory store.
#[allow(dead_code)]
pub async fn ready_manager() -> (MemoryStore, Arc<ConnectionManager>) {
    let (store, manager) = memory_manager();
    manager.initialize().await.expect("memory store should initialize");
    (store, manager)
}

#[allow(dead_code)]
pub async fn wait_for_state(manager: &ConnectionManager, target: ConnectionState) {
    let mut rx = manager.state_watch();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == target))
        .await
        .expect("state not reached in time")
        .expect("state channel closed");
}
